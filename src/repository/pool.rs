//! SQLite connection handling.
//!
//! Connections are established per operation; SQLite opens are cheap and this
//! keeps the repository `Clone` without a pool manager.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::AsyncConnection;

use super::util::to_diesel_error;

/// Diesel error type alias.
pub type DieselError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// SQLite connection source (creates connections on demand).
#[derive(Debug, Clone)]
pub struct DbPool {
    database_url: String,
}

impl DbPool {
    /// Create a pool from a database URL or path.
    pub fn new(database_url: &str) -> Self {
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    /// Create pool from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    /// Get a connection.
    pub async fn get(&self) -> Result<SqliteConn, DieselError> {
        SqliteConn::establish(&self.database_url)
            .await
            .map_err(to_diesel_error)
    }

    /// Get the database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Run a block with a fresh connection bound to `$conn`.
///
/// # Example
/// ```ignore
/// with_conn!(self.pool, conn => {
///     receipts::table.load::<ReceiptRecord>(&mut conn).await
/// })
/// ```
#[macro_export]
macro_rules! with_conn {
    ($pool:expr, $conn:ident => $body:expr) => {{
        let mut $conn = $pool.get().await?;
        $body
    }};
}
