//! Database repository - main entry point
//! Delegates to ops modules for actual operations

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_stream::try_stream;
use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, Stream};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{debug, info};

use super::gate::WriteGate;
use super::invalidation::{InvalidationTracker, Table, TableObserver};
use super::schema::{self, Migration};
use super::{DbError, Result, models::*, ops};
use crate::settings::DatabaseSettings;

/// Database connection pool wrapper
#[derive(Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
    tracker: InvalidationTracker,
    gate: WriteGate,
}

impl Database {
    /// Open (or create) the store at the given path
    pub async fn open(db_path: &Path, settings: &DatabaseSettings) -> Result<Self> {
        Self::open_with_migrations(db_path, settings, schema::MIGRATIONS).await
    }

    /// Open the store, upgrading older schema versions with `migrations`
    pub async fn open_with_migrations(
        db_path: &Path,
        settings: &DatabaseSettings,
        migrations: &[Migration],
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(settings.busy_timeout_ms))
            .synchronous(SqliteSynchronous::Normal);
        if settings.wal {
            // Readers don't block the writer and vice versa
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("Opened database at {}", db_path.display());
        Self::initialize(pool, settings, migrations).await
    }

    /// Private store that lives as long as this value
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // The data lives in the connection, keep exactly one open forever
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::initialize(pool, &DatabaseSettings::default(), schema::MIGRATIONS).await
    }

    async fn initialize(
        pool: Pool<Sqlite>,
        settings: &DatabaseSettings,
        migrations: &[Migration],
    ) -> Result<Self> {
        {
            let mut conn = pool.acquire().await?;
            schema::prepare(&mut conn, migrations, settings.destructive_fallback).await?;
        }

        Ok(Self {
            pool,
            tracker: InvalidationTracker::new(),
            gate: WriteGate::new(Duration::from_millis(settings.write_timeout_ms)),
        })
    }

    /// Close all connections, pending live queries end with an error
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run `op` inside one transaction and notify observers of `tables`
    /// after the commit. Dropping the returned future before the commit
    /// rolls everything back.
    async fn write<T, F>(&self, tables: &[Table], op: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>> + Send,
        T: Send,
    {
        let _guard = self.gate.enter().await?;
        let mut tx = self.pool.begin().await?;
        let value = op(&mut *tx).await?;

        let pending = self.tracker.pending(tables);
        if let Err(err) = tx.commit().await {
            pending.disarm();
            return Err(err.into());
        }
        drop(pending);

        Ok(value)
    }

    /// Live query over `tables`, see [`live_query`]
    fn observe<T, F>(&self, tables: &'static [Table], query: F) -> BoxStream<'static, Result<T>>
    where
        F: for<'c> Fn(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let observer = self.tracker.observe(tables);
        Box::pin(live_query(self.pool.clone(), observer, query))
    }

    // ============ Favorite Operations ============

    pub async fn add_favorite(&self, song_id: i64, added_at: i64) -> Result<()> {
        debug!("Adding favorite {}", song_id);
        self.write(&[Table::Favorites], move |conn| {
            Box::pin(ops::upsert_favorite(conn, song_id, added_at))
        })
        .await
    }

    /// Returns whether the song was a favorite
    pub async fn remove_favorite(&self, song_id: i64) -> Result<bool> {
        debug!("Removing favorite {}", song_id);
        self.write(&[Table::Favorites], move |conn| {
            Box::pin(ops::delete_favorite(conn, song_id))
        })
        .await
    }

    pub async fn is_favorite(&self, song_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        ops::is_favorite(&mut conn, song_id).await
    }

    /// Favorites, most recently added first. Re-emits on every change.
    pub fn get_all_favorites(&self) -> BoxStream<'static, Result<Vec<Favorite>>> {
        self.observe(&[Table::Favorites], |conn| Box::pin(ops::get_all_favorites(conn)))
    }

    // ============ Playlist Operations ============

    /// Returns the allocated (or supplied) id
    pub async fn insert_playlist(&self, playlist: NewPlaylist) -> Result<i64> {
        let id = self
            .write(&[Table::Playlists], move |conn| {
                Box::pin(async move { ops::insert_playlist(conn, &playlist).await })
            })
            .await?;
        debug!("Inserted playlist {}", id);
        Ok(id)
    }

    /// Deletes the playlist row only, see [`Database::clear_playlist`]
    pub async fn delete_playlist(&self, id: i64) -> Result<()> {
        debug!("Deleting playlist {}", id);
        self.write(&[Table::Playlists], move |conn| {
            Box::pin(ops::delete_playlist(conn, id))
        })
        .await
    }

    /// Insert-or-ignore, returns whether the membership is new
    pub async fn add_song_to_playlist(&self, entry: PlaylistSong) -> Result<bool> {
        self.write(&[Table::PlaylistSongs], move |conn| {
            Box::pin(async move { ops::insert_playlist_song(conn, &entry).await })
        })
        .await
    }

    /// Insert-or-ignore after the current last position
    pub async fn append_song_to_playlist(
        &self,
        playlist_id: i64,
        song_id: i64,
        added_at: i64,
    ) -> Result<bool> {
        self.write(&[Table::PlaylistSongs], move |conn| {
            Box::pin(ops::append_playlist_song(conn, playlist_id, song_id, added_at))
        })
        .await
    }

    /// Returns the number of removed rows, zero is not an error
    pub async fn remove_song_from_playlist(&self, playlist_id: i64, song_id: i64) -> Result<u64> {
        self.write(&[Table::PlaylistSongs], move |conn| {
            Box::pin(ops::delete_playlist_song(conn, playlist_id, song_id))
        })
        .await
    }

    /// Remove every song of a playlist, all or nothing
    pub async fn clear_playlist(&self, playlist_id: i64) -> Result<u64> {
        let removed = self
            .write(&[Table::PlaylistSongs], move |conn| {
                Box::pin(ops::clear_playlist_songs(conn, playlist_id))
            })
            .await?;
        debug!("Cleared {} songs from playlist {}", removed, playlist_id);
        Ok(removed)
    }

    /// Playlists, newest first. Re-emits on every change.
    pub fn get_all_playlists(&self) -> BoxStream<'static, Result<Vec<Playlist>>> {
        self.observe(&[Table::Playlists], |conn| Box::pin(ops::get_all_playlists(conn)))
    }

    /// Playlists with song counts, re-emits when playlists or memberships change
    pub fn get_playlist_summaries(&self) -> BoxStream<'static, Result<Vec<PlaylistSummary>>> {
        self.observe(&[Table::Playlists, Table::PlaylistSongs], |conn| {
            Box::pin(ops::get_playlist_summaries(conn))
        })
    }

    pub async fn get_playlist_by_id(&self, id: i64) -> Result<Option<Playlist>> {
        let mut conn = self.pool.acquire().await?;
        ops::get_playlist(&mut conn, id).await
    }

    pub async fn get_playlist_song_ids(&self, playlist_id: i64) -> Result<Vec<i64>> {
        let mut conn = self.pool.acquire().await?;
        ops::get_playlist_song_ids(&mut conn, playlist_id).await
    }

    pub async fn get_playlist_song_count(&self, playlist_id: i64) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        ops::get_playlist_song_count(&mut conn, playlist_id).await
    }

    // ============ Recent Song Operations ============

    pub async fn add_recent_song(&self, song_id: i64, played_at: i64) -> Result<()> {
        self.write(&[Table::RecentSongs], move |conn| {
            Box::pin(ops::upsert_recent_song(conn, song_id, played_at))
        })
        .await
    }

    /// The most recently played songs, capped at [`ops::RECENT_SONGS_LIMIT`]
    pub fn get_recent_songs(&self) -> BoxStream<'static, Result<Vec<RecentSong>>> {
        self.observe(&[Table::RecentSongs], |conn| Box::pin(ops::get_recent_songs(conn)))
    }

    // ============ Maintenance ============

    /// Delete all rows of all tables in one transaction
    pub async fn clear_all_tables(&self) -> Result<()> {
        info!("Clearing all tables");
        self.write(&Table::ALL, |conn| Box::pin(ops::clear_all_tables(conn)))
            .await
    }
}

async fn run_query<T, F>(pool: &Pool<Sqlite>, query: &F) -> Result<T>
where
    F: for<'c> Fn(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>>,
{
    let mut conn = pool.acquire().await?;
    query(&mut *conn).await
}

enum Wake {
    Changed,
    StoreDropped,
    PoolClosed,
}

/// Emit the query result, then re-run the query whenever one of the
/// observed tables changed. A failed query is emitted as the final item.
/// The stream ends when the store is dropped, closing the pool ends it
/// with an error.
fn live_query<T, F>(
    pool: Pool<Sqlite>,
    mut observer: TableObserver,
    query: F,
) -> impl Stream<Item = Result<T>> + Send + 'static
where
    F: for<'c> Fn(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>> + Send + Sync + 'static,
    T: Send + 'static,
{
    try_stream! {
        loop {
            let snapshot = run_query(&pool, &query).await?;
            yield snapshot;

            let wake = tokio::select! {
                changed = observer.changed() => {
                    if changed { Wake::Changed } else { Wake::StoreDropped }
                }
                _ = pool.close_event() => Wake::PoolClosed,
            };
            match wake {
                Wake::Changed => debug!("Re-running live query on {:?}", observer.tables()),
                Wake::StoreDropped => break,
                Wake::PoolClosed => Err::<(), _>(DbError::Sqlx(sqlx::Error::PoolClosed))?,
            }
        }
    }
}
