pub mod category_store;
pub mod changes;
pub mod live;
pub mod task_store;

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;

pub use category_store::{CategoryStore, SqliteCategoryStore};
pub use changes::{ChangeNotifier, TableChange};
pub use live::LiveQuery;
pub use task_store::{SqliteTaskStore, TaskStore};

/// Connection pool plus the change feed shared by both stores.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    changes: ChangeNotifier,
    shutdown: CancellationToken,
}

impl Database {
    pub async fn open(config: &AppConfig) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!("connected to {}", config.database_url);
        Self::migrated(pool).await
    }

    /// Private in-memory database, used by tests and throwaway runs.
    ///
    /// Kept on a single connection that never expires, since the data lives
    /// only as long as a connection does.
    pub async fn open_in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, AppError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            changes: ChangeNotifier::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn changes(&self) -> &ChangeNotifier {
        &self.changes
    }

    /// Ends every live query; their consumers see the end of the stream.
    pub fn stop_live_queries(&self) {
        self.shutdown.cancel();
    }

    /// Stops every live query and closes the pool. Later writes fail with
    /// a storage error.
    pub async fn close(&self) {
        self.stop_live_queries();
        self.pool.close().await;
        info!("database closed");
    }

    pub(crate) fn live<T, F, Fut>(&self, table: TableChange, query: F) -> LiveQuery<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(SqlitePool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send,
    {
        let pool = self.pool.clone();
        LiveQuery::spawn(table, &self.changes, self.shutdown.child_token(), move || {
            query(pool.clone())
        })
    }
}
