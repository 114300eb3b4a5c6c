//! Favorite song operations

use sqlx::SqliteConnection;

use crate::database::{Favorite, Result};

/// Insert a favorite, replacing the timestamp of an existing one
pub async fn upsert_favorite(conn: &mut SqliteConnection, song_id: i64, added_at: i64) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO favorites (songId, addedAt) VALUES (?, ?)")
        .bind(song_id)
        .bind(added_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Delete a favorite, returns whether a row was removed
pub async fn delete_favorite(conn: &mut SqliteConnection, song_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM favorites WHERE songId = ?")
        .bind(song_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn is_favorite(conn: &mut SqliteConnection, song_id: i64) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM favorites WHERE songId = ?)")
            .bind(song_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

/// All favorites, most recently added first
pub async fn get_all_favorites(conn: &mut SqliteConnection) -> Result<Vec<Favorite>> {
    let favorites =
        sqlx::query_as::<_, Favorite>("SELECT songId, addedAt FROM favorites ORDER BY addedAt DESC")
            .fetch_all(&mut *conn)
            .await?;
    Ok(favorites)
}
