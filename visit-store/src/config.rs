// Store configuration loaded from the environment.
use std::env;

/// Connection settings for the visit stores.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl StoreConfig {
    /// Load configuration from the environment (`.env` honored via dotenvy).
    ///
    /// `DATABASE_URL` falls back to a local development database;
    /// `DATABASE_MAX_CONNECTIONS` overrides the pool ceiling.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost:5432/visitcare".to_string());
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        Self {
            database_url,
            max_connections,
            min_connections: 2,
            acquire_timeout_secs: 30,
        }
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost:5432/visitcare".to_string(),
            max_connections: 20,
            min_connections: 2,
            acquire_timeout_secs: 30,
        }
    }
}
