//! Database module for persistent storage
//! Uses SQLite via sqlx for storing favorites, playlists and play history

mod error;
mod gate;
mod invalidation;
mod models;
mod ops;
mod repository;
pub mod schema;

pub use error::{DbError, Result, SchemaMismatch};
pub use invalidation::{InvalidationTracker, Table, TableObserver};
pub use models::*;
pub use ops::RECENT_SONGS_LIMIT;
pub use repository::Database;
