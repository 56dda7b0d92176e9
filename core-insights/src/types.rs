//! Typed views of the feature endpoint responses.
//!
//! Only the fields the views read are modelled. Unknown fields are ignored
//! and most fields default, since the backend passes upstream payloads
//! through unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Track {
    /// Absent for local files.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Option<Album>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Track {
    /// Artist names joined for display, e.g. `"A, B"`.
    pub fn artist_line(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.album
            .as_ref()
            .and_then(|album| album.images.first())
            .map(|image| image.url.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackCount {
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Entry of the playlist listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub tracks: TrackCount,
    #[serde(default)]
    pub owner: Owner,
}

impl PlaylistSummary {
    pub fn cover_url(&self) -> Option<&str> {
        self.images.first().map(|image| image.url.as_str())
    }
}

/// `GET /playlists`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<PlaylistSummary>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub next: Option<String>,
}

impl PlaylistPage {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayHistoryItem {
    pub track: Track,
    pub played_at: DateTime<Utc>,
}

/// `GET /recently-played`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecentlyPlayed {
    #[serde(default)]
    pub items: Vec<PlayHistoryItem>,
}

impl RecentlyPlayed {
    /// Distinct track ids, in play order.
    pub fn track_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for id in self.items.iter().filter_map(|item| item.track.id.as_deref()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn last_played_at(&self) -> Option<DateTime<Utc>> {
        self.items.iter().map(|item| item.played_at).max()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Null for tracks that were removed upstream.
    #[serde(default)]
    pub track: Option<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaylistTracks {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

/// `GET /playlist/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistDetails {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub tracks: PlaylistTracks,
}

impl PlaylistDetails {
    /// Tracks that still exist and have an id.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks
            .items
            .iter()
            .filter_map(|item| item.track.as_ref())
            .filter(|track| track.id.is_some())
    }
}

/// Averaged audio features of the analysed tracks.
///
/// Every field is absent when no features were available.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioFeatures {
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
    #[serde(default)]
    pub acousticness: Option<f64>,
    /// Beats per minute.
    #[serde(default)]
    pub tempo: Option<f64>,
}

impl AudioFeatures {
    pub fn is_empty(&self) -> bool {
        self.danceability.is_none()
            && self.energy.is_none()
            && self.valence.is_none()
            && self.acousticness.is_none()
            && self.tempo.is_none()
    }

    /// A 0..1 feature as a whole percentage, clamped.
    pub fn percent(value: Option<f64>) -> Option<u8> {
        value.map(|v| (v.clamp(0.0, 1.0) * 100.0).round() as u8)
    }
}

/// Classification returned by the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aura {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `#RRGGBB`
    #[serde(default)]
    pub color: String,
}

impl Aura {
    /// The color as RGB components, if it is a `#RRGGBB` value.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.color.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuraAnalysis {
    pub aura: Aura,
    #[serde(default)]
    pub avg_features: AudioFeatures,
}

/// Result of an analysis endpoint: the classification plus the analysed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuraReport<D> {
    pub analysis: AuraAnalysis,
    pub details: D,
}

/// `details` of `GET /analyze/recent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracks: RecentlyPlayed,
}

pub type PlaylistAuraReport = AuraReport<PlaylistDetails>;
pub type RecentAuraReport = AuraReport<RecentDetails>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_playlist_page_ignores_unknown_fields() {
        let page: PlaylistPage = serde_json::from_value(json!({
            "href": "https://api.example/v1/me/playlists",
            "items": [{
                "id": "p1",
                "name": "Focus",
                "collaborative": false,
                "images": [{"url": "https://img.test/p1.jpg", "height": 640, "width": 640}],
                "tracks": {"href": "ignored", "total": 45},
                "owner": {"display_name": "Listener"}
            }],
            "limit": 20,
            "next": null,
            "total": 1
        }))
        .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].tracks.total, 45);
        assert_eq!(page.items[0].cover_url(), Some("https://img.test/p1.jpg"));
        assert!(!page.has_more());
    }

    #[test]
    fn test_recent_track_ids_are_distinct_and_ordered() {
        let recent: RecentlyPlayed = serde_json::from_value(json!({
            "items": [
                {"track": {"id": "b", "name": "B"}, "played_at": "2024-05-01T10:00:00Z"},
                {"track": {"id": "a", "name": "A"}, "played_at": "2024-05-01T09:00:00Z"},
                {"track": {"id": "b", "name": "B"}, "played_at": "2024-05-01T08:00:00.123Z"},
                {"track": {"id": null, "name": "Local"}, "played_at": "2024-05-01T07:00:00Z"}
            ]
        }))
        .unwrap();

        assert_eq!(recent.track_ids(), vec!["b", "a"]);
        assert_eq!(
            recent.last_played_at().unwrap().to_rfc3339(),
            "2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_playlist_details_skip_removed_tracks() {
        let details: PlaylistDetails = serde_json::from_value(json!({
            "id": "p1",
            "name": "Focus",
            "tracks": {
                "total": 3,
                "items": [
                    {"track": {"id": "t1", "name": "One", "artists": [{"name": "X"}, {"name": "Y"}]}},
                    {"track": null},
                    {"track": {"id": null, "name": "Local"}}
                ]
            }
        }))
        .unwrap();

        let tracks: Vec<_> = details.tracks().collect();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].artist_line(), "X, Y");
    }

    #[test]
    fn test_empty_analysis_has_no_features() {
        let analysis: AuraAnalysis = serde_json::from_value(json!({
            "aura": {
                "name": "The Mysterious Void",
                "description": "No features found",
                "color": "#9E9E9E"
            },
            "avg_features": {}
        }))
        .unwrap();

        assert!(analysis.avg_features.is_empty());
        assert_eq!(analysis.aura.rgb(), Some((0x9E, 0x9E, 0x9E)));
    }

    #[test]
    fn test_feature_percentages() {
        assert_eq!(AudioFeatures::percent(Some(0.756)), Some(76));
        assert_eq!(AudioFeatures::percent(Some(1.4)), Some(100));
        assert_eq!(AudioFeatures::percent(None), None);
    }

    #[test]
    fn test_aura_rgb_rejects_bad_colors() {
        let aura = |color: &str| Aura {
            name: "x".to_string(),
            description: String::new(),
            color: color.to_string(),
        };
        assert_eq!(aura("#FFEB3B").rgb(), Some((0xFF, 0xEB, 0x3B)));
        assert_eq!(aura("FFEB3B").rgb(), None);
        assert_eq!(aura("#FFF").rgb(), None);
        assert_eq!(aura("#GGGGGG").rgb(), None);
    }
}
