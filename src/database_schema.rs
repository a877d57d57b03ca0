use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use thiserror::Error;

/// Tables whose names start with this prefix belong to the engine.
pub const SYSTEM_TABLE_PREFIX: &str = "sqlite_";

const LIST_TABLES: &str = "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name";
const LIST_COLUMNS: &str = "SELECT name FROM pragma_table_info(?1) ORDER BY cid";

// https://www.sqlite.org/rescode.html
const SQLITE_CANTOPEN: i32 = 14;
const SQLITE_NOTADB: i32 = 26;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database file not found at '{}'", .0.display())]
    DatabaseMissing(PathBuf),
    #[error("error connecting to database '{}': {source}", .path.display())]
    Connect { path: PathBuf, source: sqlx::Error },
    #[error("error fetching tables: {0}")]
    ListTables(sqlx::Error),
    #[error("error fetching columns for table '{table}': {source}")]
    ListColumns { table: String, source: sqlx::Error },
    #[error("table '{0}' was not found in the database")]
    UnknownTable(String),
}

impl SchemaError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SchemaError::DatabaseMissing(_) => Some(
                "Check `data_dir` and `source_db_file` in the configuration; \
                 the database file must exist before any stage can run.",
            ),
            SchemaError::Connect { source, .. } => match sqlite_code(source) {
                Some(SQLITE_CANTOPEN) => Some(
                    "SQLite could not open the file. It may be locked by another \
                     program or unreadable by this account.",
                ),
                Some(SQLITE_NOTADB) => Some("The file exists but is not a SQLite database."),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Primary result code of a SQLite error, if the error came from the engine.
fn sqlite_code(error: &sqlx::Error) -> Option<i32> {
    match error {
        sqlx::Error::Database(d) => d
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| code & 0xff),
        _ => None,
    }
}

pub fn is_system_table(name: &str) -> bool {
    name.starts_with(SYSTEM_TABLE_PREFIX)
}

/// Read-only view of a database schema.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// User tables, system tables excluded.
    async fn list_tables(&self) -> Result<Vec<String>, SchemaError>;

    async fn list_columns(&self, table: &str) -> Result<Vec<String>, SchemaError>;
}

#[derive(Debug)]
pub struct SqliteSchema {
    pool: Pool<Sqlite>,
}

impl SqliteSchema {
    pub async fn connect(path: &Path) -> Result<Self, SchemaError> {
        if !path.is_file() {
            return Err(SchemaError::DatabaseMissing(path.to_path_buf()));
        }

        let options = SqliteConnectOptions::new().filename(path).read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|source| SchemaError::Connect {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self { pool })
    }

    /// Releases the connection. Callers close before touching any output file.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SchemaSource for SqliteSchema {
    async fn list_tables(&self) -> Result<Vec<String>, SchemaError> {
        let rows = sqlx::query(LIST_TABLES)
            .fetch_all(&self.pool)
            .await
            .map_err(SchemaError::ListTables)?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0).map_err(SchemaError::ListTables)?;
            if !is_system_table(&name) {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>, SchemaError> {
        let map_err = |source| SchemaError::ListColumns {
            table: table.to_string(),
            source,
        };

        let rows = sqlx::query(LIST_COLUMNS)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;

        // pragma_table_info yields nothing for a table that does not exist
        if rows.is_empty() {
            return Err(SchemaError::UnknownTable(table.to_string()));
        }

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(map_err))
            .collect()
    }
}

/// A fixed schema held in memory: table name to column names.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub(crate) struct StaticSchema {
    tables: std::collections::BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .insert(table.to_string(), columns.into_iter().map(Into::into).collect());
        self
    }
}

#[cfg(test)]
#[async_trait]
impl SchemaSource for StaticSchema {
    async fn list_tables(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self
            .tables
            .keys()
            .filter(|name| !is_system_table(name))
            .cloned()
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>, SchemaError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))
    }
}
