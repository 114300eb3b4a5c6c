//! Database models for persistent storage
//! These models map directly to SQLite tables (column names are camelCase)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A song the user marked as favorite
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    /// Media index id of the song
    pub song_id: i64,
    /// When it was (last) added, epoch millis
    pub added_at: i64,
}

/// Playlist stored in database
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    /// Unique identifier (auto-increment)
    pub id: i64,
    /// Playlist name, not necessarily unique
    pub name: String,
    /// Created timestamp, epoch millis
    pub created_at: i64,
}

/// Membership of a song in a playlist with ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSong {
    pub playlist_id: i64,
    pub song_id: i64,
    /// When added to playlist
    pub added_at: i64,
    /// Position in playlist (for ordering, gaps allowed)
    pub position: i64,
}

/// Recently played song
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct RecentSong {
    pub song_id: i64,
    /// Last time the song was played, epoch millis
    pub played_at: i64,
}

/// Playlist together with the number of songs it contains
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: i64,
    pub name: String,
    pub song_count: i64,
    pub created_at: i64,
}

// ============ Input structs for creating new records ============

/// Input for creating (or replacing) a playlist
#[derive(Debug, Clone)]
pub struct NewPlaylist {
    /// Explicit id, `None` or `Some(0)` lets the store allocate one.
    /// An id that already exists replaces that playlist row.
    pub id: Option<i64>,
    pub name: String,
    pub created_at: i64,
}

impl NewPlaylist {
    pub fn new(name: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            created_at,
        }
    }

    /// The id to bind, with zero meaning "allocate"
    pub(crate) fn explicit_id(&self) -> Option<i64> {
        self.id.filter(|id| *id != 0)
    }
}
