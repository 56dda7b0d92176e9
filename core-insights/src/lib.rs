//! # Listening Insights
//!
//! Typed access to the backend's playlist and analysis endpoints.
//!
//! The mood classification itself runs in the backend; this crate only
//! fetches and decodes its results through the authorized client.

pub mod client;
pub mod error;
pub mod types;

pub use client::InsightsClient;
pub use error::{InsightsError, Result};
pub use types::{
    Album, Artist, AudioFeatures, Aura, AuraAnalysis, AuraReport, Image, Owner, PlayHistoryItem,
    PlaylistAuraReport, PlaylistDetails, PlaylistItem, PlaylistPage, PlaylistSummary,
    PlaylistTracks, RecentAuraReport, RecentDetails, RecentlyPlayed, Track, TrackCount,
};
