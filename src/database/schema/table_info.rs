//! Structural description of a table, either declared in code or read
//! back from SQLite with the `pragma_*` table-valued functions

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use sqlx::SqliteConnection;

use super::{ColumnDef, IndexDef, TableDef};
use crate::database::Result;

/// Column as seen by `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type, upper-cased
    pub sql_type: String,
    pub not_null: bool,
    /// 1-based position inside the primary key, 0 if not part of it
    pub primary_key_position: i64,
}

/// Explicitly created index (origin `c`), primary key indices are ignored
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: BTreeMap<String, ColumnInfo>,
    pub indices: BTreeSet<IndexInfo>,
}

impl TableInfo {
    /// Read the stored structure of `table`.
    /// A missing table yields an info without columns.
    pub async fn read(conn: &mut SqliteConnection, table: &str) -> Result<Self> {
        let rows: Vec<(String, String, i64, i64)> = sqlx::query_as(
            r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?)"#,
        )
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

        let columns = rows
            .into_iter()
            .map(|(name, sql_type, not_null, pk)| {
                let column = ColumnInfo {
                    name: name.clone(),
                    sql_type: sql_type.to_uppercase(),
                    not_null: not_null != 0,
                    primary_key_position: pk,
                };
                (name, column)
            })
            .collect();

        let index_rows: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT name, "unique" FROM pragma_index_list(?) WHERE origin = 'c'"#,
        )
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

        let mut indices = BTreeSet::new();
        for (name, unique) in index_rows {
            let columns: Vec<Option<String>> =
                sqlx::query_scalar("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                    .bind(&name)
                    .fetch_all(&mut *conn)
                    .await?;
            indices.insert(IndexInfo {
                name,
                unique: unique != 0,
                // Expression columns have no name
                columns: columns
                    .into_iter()
                    .map(|column| column.unwrap_or_else(|| "<expr>".to_owned()))
                    .collect(),
            });
        }

        Ok(Self {
            name: table.to_owned(),
            columns,
            indices,
        })
    }
}

impl From<&ColumnDef> for ColumnInfo {
    fn from(def: &ColumnDef) -> Self {
        Self {
            name: def.name.to_owned(),
            sql_type: def.sql_type.to_uppercase(),
            not_null: def.not_null,
            primary_key_position: def.primary_key_position,
        }
    }
}

impl From<&IndexDef> for IndexInfo {
    fn from(def: &IndexDef) -> Self {
        Self {
            name: def.name.to_owned(),
            unique: def.unique,
            columns: def.columns.iter().map(|c| (*c).to_owned()).collect(),
        }
    }
}

impl From<&TableDef> for TableInfo {
    fn from(def: &TableDef) -> Self {
        Self {
            name: def.name.to_owned(),
            columns: def
                .columns
                .iter()
                .map(|c| (c.name.to_owned(), ColumnInfo::from(c)))
                .collect(),
            indices: def.indices.iter().map(IndexInfo::from).collect(),
        }
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.sql_type)?;
        if self.not_null {
            write!(f, " NOT NULL")?;
        }
        if self.primary_key_position > 0 {
            write!(f, " PK#{}", self.primary_key_position)?;
        }
        Ok(())
    }
}

impl fmt::Display for IndexInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unique {
            write!(f, "UNIQUE ")?;
        }
        write!(f, "{}({})", self.name, self.columns.join(", "))
    }
}

impl fmt::Display for TableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns: Vec<String> = self.columns.values().map(ToString::to_string).collect();
        write!(f, "{}[columns: {{{}}}", self.name, columns.join(", "))?;
        let indices: Vec<String> = self.indices.iter().map(ToString::to_string).collect();
        write!(f, ", indices: {{{}}}]", indices.join(", "))
    }
}
