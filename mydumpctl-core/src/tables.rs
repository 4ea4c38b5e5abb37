//! Listing the tables of a database.
//!
//! The selector only needs one thing from a live server: the names of every
//! table in the target database. [`TableLister`] is that capability; the
//! default implementation queries `INFORMATION_SCHEMA` over a short-lived
//! single-connection sqlx pool.

use crate::Result;
use async_trait::async_trait;

/// Provides the full table list of a database.
#[async_trait]
pub trait TableLister: Send + Sync {
    /// Returns every table (and view) name in `database`, in server order.
    ///
    /// # Errors
    /// Returns `DumperError::TableListing` if the server cannot be queried.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>>;
}

#[cfg(feature = "mysql")]
pub use mysql::MySqlTableLister;

#[cfg(feature = "mysql")]
mod mysql {
    use super::TableLister;
    use crate::Result;
    use crate::error::DumperError;
    use async_trait::async_trait;
    use sqlx::mysql::MySqlPoolOptions;
    use std::time::Duration;
    use tracing::debug;
    use zeroize::Zeroizing;

    const TABLES_QUERY: &str = r"
        SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME
        FROM INFORMATION_SCHEMA.TABLES
        WHERE TABLE_SCHEMA = ?
        ORDER BY TABLE_NAME
    ";

    /// Lists tables through a MySQL connection.
    ///
    /// The connection URL is held in a `Zeroizing` buffer and never logged.
    pub struct MySqlTableLister {
        connection_url: Zeroizing<String>,
        connect_timeout: Duration,
    }

    impl std::fmt::Debug for MySqlTableLister {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MySqlTableLister")
                .field("connect_timeout", &self.connect_timeout)
                .finish_non_exhaustive()
        }
    }

    impl MySqlTableLister {
        /// Creates a lister for the server at `connection_url`.
        pub fn new(connection_url: impl Into<String>) -> Self {
            Self {
                connection_url: Zeroizing::new(connection_url.into()),
                connect_timeout: Duration::from_secs(30),
            }
        }

        /// Builder method to set the connection timeout.
        pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
            self.connect_timeout = timeout;
            self
        }
    }

    #[async_trait]
    impl TableLister for MySqlTableLister {
        async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
            let pool = MySqlPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(self.connect_timeout)
                .connect(&self.connection_url)
                .await
                .map_err(|e| DumperError::table_listing("Failed to connect to MySQL", e))?;

            let tables: Vec<String> = sqlx::query_scalar(TABLES_QUERY)
                .bind(database)
                .fetch_all(&pool)
                .await
                .map_err(|e| DumperError::table_listing("Failed to enumerate tables", e))?;

            pool.close().await;

            debug!("Listed {} tables in '{}'", tables.len(), database);
            Ok(tables)
        }
    }

}
