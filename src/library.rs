//! Music library operations on top of the persistence store
//!
//! Stamps writes with the current time and layers the playlist policies
//! (append at the end, clear membership before deleting) over the store.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{BoxStream, StreamExt};
use serde::Serialize;
use tracing::info;

use crate::database::{Database, DbError, Favorite, NewPlaylist, PlaylistSummary, RecentSong, Result};
use crate::utils::current_timestamp_millis;

/// Snapshot of everything the library stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySummary {
    pub favorites: Vec<Favorite>,
    pub playlists: Vec<PlaylistSummary>,
    pub recent_songs: Vec<RecentSong>,
}

#[derive(Debug, Clone)]
pub struct MusicLibrary {
    db: Arc<Database>,
}

impl MusicLibrary {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // ============ Favorites ============

    /// Flip the favorite state of a song, returns the new state
    pub async fn toggle_favorite(&self, song_id: i64) -> Result<bool> {
        if self.db.remove_favorite(song_id).await? {
            return Ok(false);
        }
        self.db.add_favorite(song_id, current_timestamp_millis()).await?;
        Ok(true)
    }

    pub async fn is_favorite(&self, song_id: i64) -> Result<bool> {
        self.db.is_favorite(song_id).await
    }

    /// Ids of all favorite songs, re-emitted on every change
    pub fn favorite_song_ids(&self) -> BoxStream<'static, Result<HashSet<i64>>> {
        self.db
            .get_all_favorites()
            .map(|favorites| -> Result<HashSet<i64>> {
                Ok(favorites?.into_iter().map(|f| f.song_id).collect())
            })
            .boxed()
    }

    // ============ Playlists ============

    pub async fn create_playlist(&self, name: &str) -> Result<i64> {
        let id = self
            .db
            .insert_playlist(NewPlaylist::new(name, current_timestamp_millis()))
            .await?;
        info!("Created playlist {} ({})", id, name);
        Ok(id)
    }

    /// Delete a playlist together with its songs
    pub async fn delete_playlist(&self, playlist_id: i64) -> Result<()> {
        self.db.clear_playlist(playlist_id).await?;
        self.db.delete_playlist(playlist_id).await?;
        info!("Deleted playlist {}", playlist_id);
        Ok(())
    }

    /// Append a song, a song already in the playlist keeps its place
    pub async fn add_song_to_playlist(&self, song_id: i64, playlist_id: i64) -> Result<bool> {
        self.db
            .append_song_to_playlist(playlist_id, song_id, current_timestamp_millis())
            .await
    }

    pub async fn remove_song_from_playlist(&self, song_id: i64, playlist_id: i64) -> Result<()> {
        self.db.remove_song_from_playlist(playlist_id, song_id).await?;
        Ok(())
    }

    pub async fn playlist_song_ids(&self, playlist_id: i64) -> Result<Vec<i64>> {
        self.db.get_playlist_song_ids(playlist_id).await
    }

    /// Playlists with song counts, newest first
    pub fn playlists(&self) -> BoxStream<'static, Result<Vec<PlaylistSummary>>> {
        self.db.get_playlist_summaries()
    }

    // ============ History ============

    pub async fn record_play(&self, song_id: i64) -> Result<()> {
        self.db.add_recent_song(song_id, current_timestamp_millis()).await
    }

    pub fn recent_songs(&self) -> BoxStream<'static, Result<Vec<RecentSong>>> {
        self.db.get_recent_songs()
    }

    /// Current contents of every live query
    pub async fn summary(&self) -> Result<LibrarySummary> {
        let favorites = first(self.db.get_all_favorites()).await?;
        let playlists = first(self.playlists()).await?;
        let recent_songs = first(self.recent_songs()).await?;
        Ok(LibrarySummary {
            favorites,
            playlists,
            recent_songs,
        })
    }
}

async fn first<T>(mut stream: BoxStream<'static, Result<T>>) -> Result<T> {
    stream.next().await.unwrap_or(Err(DbError::LiveQueryEnded))
}
