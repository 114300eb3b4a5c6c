//! Database operations organized by entity type
//!
//! Every function runs on a borrowed connection; the caller decides whether
//! that is a pooled connection (reads) or an open transaction (writes).

mod favorites;
mod playlists;
mod recent;

pub use favorites::*;
pub use playlists::*;
pub use recent::*;

use sqlx::SqliteConnection;

use super::{Result, Table};

/// Delete every row of every store table
pub async fn clear_all_tables(conn: &mut SqliteConnection) -> Result<()> {
    for table in Table::ALL {
        let sql = format!("DELETE FROM {}", table.name());
        sqlx::query(&sql).execute(&mut *conn).await?;
    }
    Ok(())
}
