//! Recently played songs

use sqlx::SqliteConnection;

use crate::database::{RecentSong, Result};

/// Maximum number of rows the recent songs query returns
pub const RECENT_SONGS_LIMIT: i64 = 50;

/// Record a play, replaying a song refreshes its timestamp
pub async fn upsert_recent_song(conn: &mut SqliteConnection, song_id: i64, played_at: i64) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO recent_songs (songId, playedAt) VALUES (?, ?)")
        .bind(song_id)
        .bind(played_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Most recently played songs first, capped at [`RECENT_SONGS_LIMIT`]
pub async fn get_recent_songs(conn: &mut SqliteConnection) -> Result<Vec<RecentSong>> {
    let songs = sqlx::query_as::<_, RecentSong>(
        "SELECT songId, playedAt FROM recent_songs ORDER BY playedAt DESC LIMIT ?",
    )
    .bind(RECENT_SONGS_LIMIT)
    .fetch_all(&mut *conn)
    .await?;
    Ok(songs)
}
