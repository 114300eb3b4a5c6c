//! Errors surfaced by the persistence store

use thiserror::Error;

use super::schema::TableInfo;

#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite failures, including constraint violations. The enclosing
    /// transaction has been rolled back when this is returned from a write.
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SchemaMismatch(Box<SchemaMismatch>),

    #[error(
        "schema fingerprint mismatch: expected {expected}, found {found} \
         (the schema changed without bumping the version)"
    )]
    IdentityMismatch { expected: String, found: String },

    #[error("no migration path from schema version {from} to {to}")]
    MissingMigration { from: i64, to: i64 },

    #[error("timed out after {millis} ms waiting for write access")]
    WriteTimeout { millis: u64 },

    /// A live query finished before producing its first result
    #[error("live query ended without a result")]
    LiveQueryEnded,
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Structural difference between the expected and the stored table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema validation failed for table `{table}`\n expected: {expected}\n found: {found}")]
pub struct SchemaMismatch {
    pub table: String,
    pub expected: TableInfo,
    pub found: TableInfo,
}

impl From<SchemaMismatch> for DbError {
    fn from(mismatch: SchemaMismatch) -> Self {
        DbError::SchemaMismatch(Box::new(mismatch))
    }
}
