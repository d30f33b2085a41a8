//! Database layer for Quotebook
//!
//! Provides:
//! - SeaORM entity models
//! - Generic content repository
//! - Connection pool management
//! - Listing query composition

pub mod models;
pub mod query;
mod repository;

pub use repository::{search_document, ContentRepo, SeaContentRepo};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Primary connection for writes plus an optional read replica
#[derive(Clone)]
pub struct DbPool {
    pub primary: DatabaseConnection,
    pub replica: Option<DatabaseConnection>,
}

async fn connect(url: &str, config: &DatabaseConfig, role: &str) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);

    Database::connect(opts)
        .await
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to connect to {role}: {e}"),
        })
}

impl DbPool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");
        let primary = connect(&config.url, config, "primary").await?;

        let replica = match config.read_url.as_deref() {
            Some(read_url) => {
                info!("Connecting to read replica...");
                Some(connect(read_url, config, "replica").await?)
            }
            None => None,
        };

        info!(replica = replica.is_some(), "Database connections established");
        Ok(Self { primary, replica })
    }

    /// Replica when configured, otherwise primary
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Underlying sqlx pool of the primary, used for migrations
    pub fn migration_pool(&self) -> &sea_orm::sqlx::PgPool {
        self.primary.get_postgres_connection_pool()
    }

    /// Readiness check against every connection
    pub async fn ping(&self) -> Result<()> {
        self.primary.ping().await.map_err(|e| AppError::DatabaseConnection {
            message: format!("Primary ping failed: {e}"),
        })?;
        if let Some(replica) = &self.replica {
            replica.ping().await.map_err(|e| AppError::DatabaseConnection {
                message: format!("Replica ping failed: {e}"),
            })?;
        }
        Ok(())
    }
}
