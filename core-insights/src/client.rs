//! Feature endpoint client.
//!
//! Every call goes through [`AuthorizedClient`], so an expired access token
//! is refreshed and the call replayed once without the caller noticing.

use crate::error::{InsightsError, Result};
use crate::types::{PlaylistAuraReport, PlaylistDetails, PlaylistPage, RecentAuraReport, RecentlyPlayed};
use core_auth::AuthorizedClient;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

/// Client for the playlist and analysis endpoints.
#[derive(Debug, Clone)]
pub struct InsightsClient {
    client: AuthorizedClient,
}

impl InsightsClient {
    pub fn new(client: AuthorizedClient) -> Self {
        Self { client }
    }

    /// The signed-in user's playlists.
    #[instrument(skip(self))]
    pub async fn playlists(&self) -> Result<PlaylistPage> {
        let page: PlaylistPage = self.get("playlists").await?;
        debug!(count = page.items.len(), total = page.total, "Fetched playlists");
        Ok(page)
    }

    /// Tracks the user played most recently.
    #[instrument(skip(self))]
    pub async fn recently_played(&self) -> Result<RecentlyPlayed> {
        let recent: RecentlyPlayed = self.get("recently-played").await?;
        debug!(count = recent.items.len(), "Fetched recently played tracks");
        Ok(recent)
    }

    /// One playlist with its tracks.
    #[instrument(skip(self))]
    pub async fn playlist(&self, playlist_id: &str) -> Result<PlaylistDetails> {
        let path = format!("playlist/{}", encode_id(playlist_id)?);
        self.get(&path).await
    }

    /// Aura classification of a playlist.
    #[instrument(skip(self))]
    pub async fn analyze_playlist(&self, playlist_id: &str) -> Result<PlaylistAuraReport> {
        let path = format!("analyze/playlist/{}", encode_id(playlist_id)?);
        let report: PlaylistAuraReport = self.get(&path).await?;
        debug!(aura = %report.analysis.aura.name, "Playlist analysed");
        Ok(report)
    }

    /// Aura classification of the recently played tracks.
    #[instrument(skip(self))]
    pub async fn analyze_recent(&self) -> Result<RecentAuraReport> {
        let report: RecentAuraReport = self.get("analyze/recent").await?;
        debug!(aura = %report.analysis.aura.name, "Recent listening analysed");
        Ok(report)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(self.client.get_json(path, &[]).await?)
    }
}

fn encode_id(playlist_id: &str) -> Result<String> {
    let trimmed = playlist_id.trim();
    if trimmed.is_empty() || trimmed.contains('/') {
        return Err(InsightsError::InvalidPlaylistId(playlist_id.to_string()));
    }
    Ok(urlencoding::encode(trimmed).into_owned())
}
