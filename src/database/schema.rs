//! Database schema, versioning and store-open validation
//!
//! The schema version lives in `PRAGMA user_version`, a fingerprint of the
//! canonical CREATE statements lives in `store_metadata`. Opening a store
//! either creates the schema, validates it, or migrates it step by step.

mod table_info;

pub use table_info::{ColumnInfo, IndexInfo, TableInfo};

use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, warn};

use super::{DbError, Result, SchemaMismatch};

/// Current schema version
pub const SCHEMA_VERSION: i64 = 1;

pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub not_null: bool,
    pub primary_key_position: i64,
}

pub struct IndexDef {
    pub name: &'static str,
    pub unique: bool,
    pub columns: &'static [&'static str],
    pub create_sql: &'static str,
}

pub struct TableDef {
    pub name: &'static str,
    pub create_sql: &'static str,
    pub columns: &'static [ColumnDef],
    pub indices: &'static [IndexDef],
}

const fn column(name: &'static str, sql_type: &'static str, primary_key_position: i64) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        not_null: true,
        primary_key_position,
    }
}

pub(crate) const FAVORITES: TableDef = TableDef {
    name: "favorites",
    create_sql: "CREATE TABLE IF NOT EXISTS favorites (songId INTEGER NOT NULL, addedAt INTEGER NOT NULL, PRIMARY KEY(songId))",
    columns: &[column("songId", "INTEGER", 1), column("addedAt", "INTEGER", 0)],
    indices: &[],
};

pub(crate) const PLAYLISTS: TableDef = TableDef {
    name: "playlists",
    create_sql: "CREATE TABLE IF NOT EXISTS playlists (id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, name TEXT NOT NULL, createdAt INTEGER NOT NULL)",
    columns: &[
        column("id", "INTEGER", 1),
        column("name", "TEXT", 0),
        column("createdAt", "INTEGER", 0),
    ],
    indices: &[],
};

// No foreign key to playlists: membership rows outlive a deleted playlist
// until the caller clears them.
pub(crate) const PLAYLIST_SONGS: TableDef = TableDef {
    name: "playlist_songs",
    create_sql: "CREATE TABLE IF NOT EXISTS playlist_songs (playlistId INTEGER NOT NULL, songId INTEGER NOT NULL, addedAt INTEGER NOT NULL, position INTEGER NOT NULL, PRIMARY KEY(playlistId, songId))",
    columns: &[
        column("playlistId", "INTEGER", 1),
        column("songId", "INTEGER", 2),
        column("addedAt", "INTEGER", 0),
        column("position", "INTEGER", 0),
    ],
    indices: &[
        IndexDef {
            name: "index_playlist_songs_playlistId",
            unique: false,
            columns: &["playlistId"],
            create_sql: "CREATE INDEX IF NOT EXISTS index_playlist_songs_playlistId ON playlist_songs (playlistId)",
        },
        IndexDef {
            name: "index_playlist_songs_songId",
            unique: false,
            columns: &["songId"],
            create_sql: "CREATE INDEX IF NOT EXISTS index_playlist_songs_songId ON playlist_songs (songId)",
        },
    ],
};

pub(crate) const RECENT_SONGS: TableDef = TableDef {
    name: "recent_songs",
    create_sql: "CREATE TABLE IF NOT EXISTS recent_songs (songId INTEGER NOT NULL, playedAt INTEGER NOT NULL, PRIMARY KEY(songId))",
    columns: &[column("songId", "INTEGER", 1), column("playedAt", "INTEGER", 0)],
    indices: &[],
};

pub(crate) const TABLES: [&TableDef; 4] = [&FAVORITES, &PLAYLISTS, &PLAYLIST_SONGS, &RECENT_SONGS];

const METADATA_TABLE: &str = "store_metadata";

const CREATE_METADATA: &str = "CREATE TABLE IF NOT EXISTS store_metadata (id INTEGER PRIMARY KEY CHECK (id = 1), identity_hash TEXT NOT NULL)";

/// A declared upgrade step between two schema versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub from: i64,
    pub to: i64,
    /// Executed in order inside one transaction
    pub statements: &'static [&'static str],
}

/// Upgrade steps shipped with the store
pub const MIGRATIONS: &[Migration] = &[];

/// Fingerprint of the canonical schema
pub fn identity_hash() -> String {
    let mut context = md5::Context::new();
    for table in TABLES {
        context.consume(table.create_sql.as_bytes());
        for index in table.indices {
            context.consume(index.create_sql.as_bytes());
        }
    }
    format!("{:x}", context.compute())
}

/// Create, validate or migrate the schema of a freshly opened store
pub(crate) async fn prepare(
    conn: &mut SqliteConnection,
    migrations: &[Migration],
    destructive_fallback: bool,
) -> Result<()> {
    let version = user_version(conn).await?;

    if version == 0 && !has_store_tables(conn).await? {
        create_all(conn).await?;
        info!("Created database schema version {}", SCHEMA_VERSION);
        return Ok(());
    }

    let migrated = if version == SCHEMA_VERSION {
        false
    } else {
        match migration_path(migrations, version, SCHEMA_VERSION) {
            Some(path) => {
                run_migrations(conn, &path).await?;
                true
            }
            None if destructive_fallback => {
                warn!(
                    "No migration path from schema version {} to {}, recreating all tables",
                    version, SCHEMA_VERSION
                );
                recreate_all(conn).await?;
                return Ok(());
            }
            None => {
                return Err(DbError::MissingMigration {
                    from: version,
                    to: SCHEMA_VERSION,
                });
            }
        }
    };

    validate_all(conn).await?;

    if migrated {
        write_identity(conn).await
    } else {
        check_identity(conn).await
    }
}

/// Plan upgrade steps from `from` to `to`, always taking the largest step
/// available. Downgrades are never planned.
pub(crate) fn migration_path(migrations: &[Migration], from: i64, to: i64) -> Option<Vec<Migration>> {
    if from > to {
        return None;
    }
    let mut path = Vec::new();
    let mut current = from;
    while current < to {
        let step = migrations
            .iter()
            .filter(|m| m.from == current && m.to > current && m.to <= to)
            .max_by_key(|m| m.to)?;
        path.push(*step);
        current = step.to;
    }
    Some(path)
}

/// Compare every table against its declaration
pub(crate) async fn validate_all(conn: &mut SqliteConnection) -> Result<()> {
    for table in TABLES {
        let expected = TableInfo::from(table);
        let found = TableInfo::read(conn, table.name).await?;
        if expected != found {
            return Err(SchemaMismatch {
                table: table.name.to_owned(),
                expected,
                found,
            }
            .into());
        }
    }
    Ok(())
}

async fn user_version(conn: &mut SqliteConnection) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await?;
    Ok(version)
}

async fn set_user_version(conn: &mut SqliteConnection, version: i64) -> Result<()> {
    // PRAGMA arguments can't be bound
    let sql = format!("PRAGMA user_version = {version}");
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

async fn has_store_tables(conn: &mut SqliteConnection) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (?, ?, ?, ?)",
    )
    .bind(FAVORITES.name)
    .bind(PLAYLISTS.name)
    .bind(PLAYLIST_SONGS.name)
    .bind(RECENT_SONGS.name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

async fn create_tables(conn: &mut SqliteConnection) -> Result<()> {
    for table in TABLES {
        sqlx::query(table.create_sql).execute(&mut *conn).await?;
        for index in table.indices {
            sqlx::query(index.create_sql).execute(&mut *conn).await?;
        }
    }
    sqlx::query(CREATE_METADATA).execute(&mut *conn).await?;
    upsert_identity(conn).await?;
    set_user_version(conn, SCHEMA_VERSION).await
}

async fn create_all(conn: &mut SqliteConnection) -> Result<()> {
    let mut tx = conn.begin().await?;
    create_tables(&mut tx).await?;
    tx.commit().await?;
    Ok(())
}

async fn recreate_all(conn: &mut SqliteConnection) -> Result<()> {
    let mut tx = conn.begin().await?;
    for name in TABLES.iter().map(|t| t.name).chain([METADATA_TABLE]) {
        let sql = format!("DROP TABLE IF EXISTS {name}");
        sqlx::query(&sql).execute(&mut *tx).await?;
    }
    create_tables(&mut tx).await?;
    tx.commit().await?;
    info!("Recreated database schema version {}", SCHEMA_VERSION);
    Ok(())
}

async fn run_migrations(conn: &mut SqliteConnection, path: &[Migration]) -> Result<()> {
    for step in path {
        info!("Migrating database from version {} to {}", step.from, step.to);
        let mut tx = conn.begin().await?;
        for statement in step.statements {
            debug!("Migration statement: {}", statement);
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        set_user_version(&mut tx, step.to).await?;
        tx.commit().await?;
    }
    Ok(())
}

async fn upsert_identity(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO store_metadata (id, identity_hash) VALUES (1, ?)")
        .bind(identity_hash())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn write_identity(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(CREATE_METADATA).execute(&mut *conn).await?;
    upsert_identity(conn).await
}

async fn check_identity(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(CREATE_METADATA).execute(&mut *conn).await?;
    let stored: Option<String> =
        sqlx::query_scalar("SELECT identity_hash FROM store_metadata WHERE id = 1")
            .fetch_optional(&mut *conn)
            .await?;

    let expected = identity_hash();
    match stored {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(DbError::IdentityMismatch { expected, found }),
        None => {
            warn!("Store has no schema fingerprint, recording {}", expected);
            upsert_identity(conn).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_connection() -> SqliteConnection {
        SqliteConnection::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn fresh_store_gets_current_version_and_fingerprint() {
        let mut conn = memory_connection().await;
        prepare(&mut conn, MIGRATIONS, false).await.unwrap();

        assert_eq!(user_version(&mut conn).await.unwrap(), SCHEMA_VERSION);
        let stored: String =
            sqlx::query_scalar("SELECT identity_hash FROM store_metadata WHERE id = 1")
                .fetch_one(&mut conn)
                .await
                .unwrap();
        assert_eq!(stored, identity_hash());

        // Preparing again validates instead of creating
        prepare(&mut conn, MIGRATIONS, false).await.unwrap();
    }

    #[tokio::test]
    async fn declared_tables_match_what_sqlite_reports() {
        let mut conn = memory_connection().await;
        prepare(&mut conn, MIGRATIONS, false).await.unwrap();

        let found = TableInfo::read(&mut conn, "playlist_songs").await.unwrap();
        assert_eq!(found, TableInfo::from(&PLAYLIST_SONGS));
        assert_eq!(found.indices.len(), 2);
        assert_eq!(found.columns["songId"].primary_key_position, 2);
    }

    #[tokio::test]
    async fn mismatched_table_is_reported_by_name() {
        let mut conn = memory_connection().await;
        sqlx::query("CREATE TABLE favorites (songId INTEGER PRIMARY KEY)")
            .execute(&mut conn)
            .await
            .unwrap();
        set_user_version(&mut conn, SCHEMA_VERSION).await.unwrap();

        let err = prepare(&mut conn, MIGRATIONS, false).await.unwrap_err();
        let mismatch = match err {
            DbError::SchemaMismatch(mismatch) => mismatch,
            other => panic!("unexpected error: {other}"),
        };
        assert_eq!(mismatch.table, "favorites");
        assert!(mismatch.expected.columns.contains_key("addedAt"));
        assert!(!mismatch.found.columns.contains_key("addedAt"));
        let message = mismatch.to_string();
        assert!(message.contains("favorites"));
        assert!(message.contains("addedAt INTEGER NOT NULL"));
    }

    #[tokio::test]
    async fn missing_index_is_a_mismatch() {
        let mut conn = memory_connection().await;
        prepare(&mut conn, MIGRATIONS, false).await.unwrap();
        sqlx::query("DROP INDEX index_playlist_songs_songId")
            .execute(&mut conn)
            .await
            .unwrap();

        let err = validate_all(&mut conn).await.unwrap_err();
        assert!(matches!(err, DbError::SchemaMismatch(m) if m.table == "playlist_songs"));
    }

    #[tokio::test]
    async fn legacy_store_without_migration_fails_fast() {
        let mut conn = memory_connection().await;
        sqlx::query("CREATE TABLE favorites (songId INTEGER NOT NULL, PRIMARY KEY(songId))")
            .execute(&mut conn)
            .await
            .unwrap();

        let err = prepare(&mut conn, MIGRATIONS, false).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::MissingMigration { from: 0, to: SCHEMA_VERSION }
        ));
    }

    #[tokio::test]
    async fn declared_migration_upgrades_legacy_store() {
        const LEGACY_TO_V1: &[Migration] = &[Migration {
            from: 0,
            to: 1,
            statements: &[
                "ALTER TABLE favorites ADD COLUMN addedAt INTEGER NOT NULL DEFAULT 0",
                "CREATE TABLE playlists (id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, name TEXT NOT NULL, createdAt INTEGER NOT NULL)",
                "CREATE TABLE playlist_songs (playlistId INTEGER NOT NULL, songId INTEGER NOT NULL, addedAt INTEGER NOT NULL, position INTEGER NOT NULL, PRIMARY KEY(playlistId, songId))",
                "CREATE INDEX index_playlist_songs_playlistId ON playlist_songs (playlistId)",
                "CREATE INDEX index_playlist_songs_songId ON playlist_songs (songId)",
                "CREATE TABLE recent_songs (songId INTEGER NOT NULL, playedAt INTEGER NOT NULL, PRIMARY KEY(songId))",
            ],
        }];

        let mut conn = memory_connection().await;
        sqlx::query("CREATE TABLE favorites (songId INTEGER NOT NULL, PRIMARY KEY(songId))")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO favorites (songId) VALUES (7)")
            .execute(&mut conn)
            .await
            .unwrap();

        prepare(&mut conn, LEGACY_TO_V1, false).await.unwrap();

        assert_eq!(user_version(&mut conn).await.unwrap(), SCHEMA_VERSION);
        let kept: i64 = sqlx::query_scalar("SELECT songId FROM favorites")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(kept, 7);
        // The fingerprint is in place, so a second open just validates
        prepare(&mut conn, LEGACY_TO_V1, false).await.unwrap();
    }

    #[tokio::test]
    async fn destructive_fallback_recreates_tables() {
        let mut conn = memory_connection().await;
        sqlx::query("CREATE TABLE favorites (songId INTEGER NOT NULL, PRIMARY KEY(songId))")
            .execute(&mut conn)
            .await
            .unwrap();
        set_user_version(&mut conn, 7).await.unwrap();

        prepare(&mut conn, MIGRATIONS, true).await.unwrap();

        assert_eq!(user_version(&mut conn).await.unwrap(), SCHEMA_VERSION);
        validate_all(&mut conn).await.unwrap();
    }

    #[tokio::test]
    async fn foreign_fingerprint_is_rejected() {
        let mut conn = memory_connection().await;
        prepare(&mut conn, MIGRATIONS, false).await.unwrap();
        sqlx::query("UPDATE store_metadata SET identity_hash = 'deadbeef'")
            .execute(&mut conn)
            .await
            .unwrap();

        let err = prepare(&mut conn, MIGRATIONS, false).await.unwrap_err();
        assert!(matches!(err, DbError::IdentityMismatch { found, .. } if found == "deadbeef"));
    }

    #[test]
    fn migration_path_prefers_larger_steps() {
        const STEPS: &[Migration] = &[
            Migration { from: 1, to: 2, statements: &[] },
            Migration { from: 2, to: 3, statements: &[] },
            Migration { from: 1, to: 3, statements: &[] },
            Migration { from: 3, to: 4, statements: &[] },
        ];

        let path = migration_path(STEPS, 1, 4).unwrap();
        let hops: Vec<(i64, i64)> = path.iter().map(|m| (m.from, m.to)).collect();
        assert_eq!(hops, vec![(1, 3), (3, 4)]);

        assert_eq!(migration_path(STEPS, 4, 4), Some(vec![]));
        assert!(migration_path(STEPS, 4, 1).is_none());
        assert!(migration_path(STEPS, 0, 4).is_none());
    }
}
