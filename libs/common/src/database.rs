//! Database module for handling PostgreSQL connections and operations
//!
//! This module provides connection pooling, configuration, and health checks
//! for the PostgreSQL database backing the tour service.

use crate::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, migrate::Migrator, postgres::PgPoolOptions};
use std::env;
use std::time::Duration;
use tracing::{error, info};

/// Placeholder substituted with the database password in connection strings
pub const PASSWORD_PLACEHOLDER: &str = "<PASSWORD>";

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL, optionally containing the `<PASSWORD>` placeholder
    pub database_url: String,
    /// Password substituted into `database_url`
    pub password: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig
    pub fn new(database_url: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            password: password.into(),
            max_connections: 10,
            connection_timeout: 30,
        }
    }

    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DATABASE`: PostgreSQL connection URL, may contain `<PASSWORD>`
    /// - `DATABASE_PASSWORD`: value substituted for `<PASSWORD>` (default: empty)
    /// - `DATABASE_MAX_CONNECTIONS`: Maximum number of connections (default: 10)
    /// - `DATABASE_CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 30)
    pub fn from_env() -> DatabaseResult<Self> {
        let database_url = env::var("DATABASE").map_err(|_| {
            DatabaseError::Configuration("DATABASE environment variable not set".to_string())
        })?;

        let password = env::var("DATABASE_PASSWORD").unwrap_or_default();

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let connection_timeout = env::var("DATABASE_CONNECTION_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            database_url,
            password,
            max_connections,
            connection_timeout,
        })
    }

    /// The connection URL with the credential placeholder filled in
    pub fn connection_url(&self) -> String {
        self.database_url
            .replace(PASSWORD_PLACEHOLDER, &self.password)
    }
}

/// Initialize a PostgreSQL connection pool
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// * `DatabaseResult<PgPool>` - PostgreSQL connection pool or error
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<PgPool> {
    info!("Initializing database connection pool");

    let options = config
        .connection_url()
        .parse()
        .map_err(|e| DatabaseError::Configuration(format!("Invalid database URL: {}", e)))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect_with(options)
        .await
        .map_err(DatabaseError::Connection)?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Build a pool that connects on first use
///
/// Used where a handle is needed before the database is reachable.
pub fn lazy_pool(config: &DatabaseConfig) -> DatabaseResult<PgPool> {
    let options = config
        .connection_url()
        .parse()
        .map_err(|e| DatabaseError::Configuration(format!("Invalid database URL: {}", e)))?;

    Ok(PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect_lazy_with(options))
}

/// Check database connectivity
///
/// # Arguments
///
/// * `pool` - PostgreSQL connection pool
///
/// # Returns
///
/// * `DatabaseResult<bool>` - True if the database answered
pub async fn health_check(pool: &PgPool) -> DatabaseResult<bool> {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => {
            info!("Database health check successful");
            Ok(true)
        }
        Err(e) => {
            error!("Database health check failed: {}", e);
            Ok(false)
        }
    }
}

/// Apply any pending migrations from `migrator`
pub async fn run_migrations(pool: &PgPool, migrator: &Migrator) -> DatabaseResult<()> {
    info!("Running {} database migrations", migrator.iter().count());

    migrator.run(pool).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        DatabaseError::from(e)
    })?;

    info!("Database migrations applied");
    Ok(())
}
