// Database connection management
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared PostgreSQL connection pool for both store adapters.
#[derive(Clone)]
pub struct StorePool {
    pool: Arc<PgPool>,
}

impl StorePool {
    /// Create a new pool from configuration.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConnectionFailed`] when the database is unreachable.
    pub async fn new(config: &StoreConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(600))
            .connect(&config.database_url)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Visit store connection pool created"
        );

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending schema migrations.
    ///
    /// # Errors
    ///
    /// [`StoreError::MigrationError`] when a migration fails to apply.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| StoreError::MigrationError(e.to_string()))?;
        info!("Visit store migrations applied");
        Ok(())
    }

    /// Check if the pool is healthy.
    pub async fn is_healthy(&self) -> bool {
        match sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Store health check failed: {}", e);
                false
            }
        }
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Visit store connection pool closed");
    }
}
