//! Playlist and playlist membership operations

use sqlx::SqliteConnection;

use crate::database::{NewPlaylist, Playlist, PlaylistSong, PlaylistSummary, Result};

/// Insert (or replace) a playlist, returns its id
pub async fn insert_playlist(conn: &mut SqliteConnection, playlist: &NewPlaylist) -> Result<i64> {
    let result = sqlx::query("INSERT OR REPLACE INTO playlists (id, name, createdAt) VALUES (?, ?, ?)")
        .bind(playlist.explicit_id())
        .bind(&playlist.name)
        .bind(playlist.created_at)
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Delete playlist row only, membership rows stay untouched
pub async fn delete_playlist(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM playlists WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// All playlists, newest first
pub async fn get_all_playlists(conn: &mut SqliteConnection) -> Result<Vec<Playlist>> {
    let playlists = sqlx::query_as::<_, Playlist>(
        "SELECT id, name, createdAt FROM playlists ORDER BY createdAt DESC",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(playlists)
}

/// Get playlist by id
pub async fn get_playlist(conn: &mut SqliteConnection, id: i64) -> Result<Option<Playlist>> {
    let playlist =
        sqlx::query_as::<_, Playlist>("SELECT id, name, createdAt FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(playlist)
}

/// Playlists with their song counts, newest first
pub async fn get_playlist_summaries(conn: &mut SqliteConnection) -> Result<Vec<PlaylistSummary>> {
    let summaries = sqlx::query_as::<_, PlaylistSummary>(
        r#"
        SELECT p.id, p.name, p.createdAt,
            (SELECT COUNT(*) FROM playlist_songs ps WHERE ps.playlistId = p.id) AS songCount
        FROM playlists p
        ORDER BY p.createdAt DESC
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(summaries)
}

/// Add song to playlist, an existing membership is left as it is.
/// Returns whether a row was inserted.
pub async fn insert_playlist_song(conn: &mut SqliteConnection, entry: &PlaylistSong) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO playlist_songs (playlistId, songId, addedAt, position) VALUES (?, ?, ?, ?)",
    )
    .bind(entry.playlist_id)
    .bind(entry.song_id)
    .bind(entry.added_at)
    .bind(entry.position)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Add song after the last position of the playlist
pub async fn append_playlist_song(
    conn: &mut SqliteConnection,
    playlist_id: i64,
    song_id: i64,
    added_at: i64,
) -> Result<bool> {
    // Get next position
    let max_pos: Option<i64> =
        sqlx::query_scalar("SELECT MAX(position) FROM playlist_songs WHERE playlistId = ?")
            .bind(playlist_id)
            .fetch_one(&mut *conn)
            .await?;

    let entry = PlaylistSong {
        playlist_id,
        song_id,
        added_at,
        position: max_pos.map_or(0, |pos| pos + 1),
    };
    insert_playlist_song(conn, &entry).await
}

/// Remove song from playlist, returns the number of removed rows
pub async fn delete_playlist_song(conn: &mut SqliteConnection, playlist_id: i64, song_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM playlist_songs WHERE playlistId = ? AND songId = ?")
        .bind(playlist_id)
        .bind(song_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Remove all songs of a playlist, returns the number of removed rows
pub async fn clear_playlist_songs(conn: &mut SqliteConnection, playlist_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM playlist_songs WHERE playlistId = ?")
        .bind(playlist_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Song ids of a playlist in position order
pub async fn get_playlist_song_ids(conn: &mut SqliteConnection, playlist_id: i64) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT songId FROM playlist_songs WHERE playlistId = ? ORDER BY position ASC",
    )
    .bind(playlist_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

pub async fn get_playlist_song_count(conn: &mut SqliteConnection, playlist_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playlist_songs WHERE playlistId = ?")
        .bind(playlist_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}
