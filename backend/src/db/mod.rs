//! # Database Module
//!
//! This module handles all database operations for the referral ledger.
//! We use PostgreSQL for storing:
//!
//! - Users with their wallet balances and referral parent pointer
//! - Referral edges and the append-only commission history
//! - Task catalog and task completions
//! - The wallet journal, withdrawals and recharges
//!
//! ## Transactions
//!
//! Every function in [`queries`] is generic over
//! [`tokio_postgres::GenericClient`], so the same query runs on a pooled
//! connection or inside a transaction:
//!
//! ```rust,ignore
//! let mut client = db.client().await?;
//! let user = queries::get_user(&**client, id).await?;   // pooled
//!
//! let tx = client.transaction().await?;
//! let user = queries::lock_user(&*tx, id).await?;       // transactional
//! tx.commit().await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      DATABASE LAYER                              │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │                   Connection Pool                         │   │
//! │  │                  (deadpool-postgres)                      │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! │                              │                                   │
//! │         ┌────────────────────┼────────────────────┐             │
//! │         ▼                    ▼                    ▼             │
//! │  ┌────────────┐      ┌────────────┐       ┌────────────┐       │
//! │  │   Users    │      │  Referral  │       │  Journal   │       │
//! │  │  & Wallets │      │   Graph    │       │ & Payouts  │       │
//! │  └────────────┘      └────────────┘       └────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod models;
pub mod queries;

use deadpool_postgres::{Config, Object, Pool, Runtime};
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Config as TokioConfig, NoTls};
use tracing::{debug, error, info, warn};

/// Key for the advisory lock serializing concurrent migration runs.
const MIGRATION_LOCK_KEY: i64 = 0x5245_4645_5252_414c;

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to connect to the database
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryError(tokio_postgres::Error),

    /// A unique constraint rejected the write. Holds the constraint name.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Migration failed
    #[error("Migration failed: {0}")]
    MigrationError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<tokio_postgres::Error> for DatabaseError {
    fn from(e: tokio_postgres::Error) -> Self {
        if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            let constraint = e
                .as_db_error()
                .and_then(|db_err| db_err.constraint())
                .unwrap_or("unknown")
                .to_string();
            return DatabaseError::UniqueViolation(constraint);
        }
        DatabaseError::QueryError(e)
    }
}

impl From<deadpool_postgres::PoolError> for DatabaseError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        DatabaseError::ConnectionError(e.to_string())
    }
}

/// Database connection wrapper.
///
/// This struct wraps the connection pool and provides
/// methods for common database operations.
///
/// ## Usage
///
/// ```rust,ignore
/// let db = Database::connect("postgres://...").await?;
/// let client = db.client().await?;
/// let user = queries::get_user(&**client, user_id).await?;
/// ```
#[derive(Clone)]
pub struct Database {
    /// The connection pool
    pool: Pool,
}

impl Database {
    /// Connect to the PostgreSQL database.
    ///
    /// Creates a connection pool (max 16 connections) and verifies
    /// it with a trivial query.
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        info!("Connecting to database...");

        let tokio_config = database_url
            .parse::<TokioConfig>()
            .map_err(|e| DatabaseError::ConfigError(format!("Invalid database URL: {}", e)))?;

        let mut config = Config::new();

        if let Some(dbname) = tokio_config.get_dbname() {
            config.dbname = Some(dbname.to_string());
        }
        if let Some(user) = tokio_config.get_user() {
            config.user = Some(user.to_string());
        }
        if let Some(password) = tokio_config.get_password() {
            config.password = Some(String::from_utf8_lossy(password).to_string());
        }
        if let Some(tokio_postgres::config::Host::Tcp(host)) = tokio_config.get_hosts().first() {
            config.host = Some(host.clone());
        }
        if let Some(port) = tokio_config.get_ports().first() {
            config.port = Some(*port);
        }

        config.pool = Some(deadpool_postgres::PoolConfig {
            max_size: 16,
            ..Default::default()
        });

        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let client = pool.get().await?;
        client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// The schema file is idempotent and applied on every start. A
    /// session advisory lock keeps concurrent instances (and parallel
    /// integration tests) from racing each other's DDL.
    ///
    /// ## Migration Files
    ///
    /// ```text
    /// migrations/
    /// └── 001_initial_schema.sql
    /// ```
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        info!("Running database migrations...");

        let migration_paths = [
            "migrations/001_initial_schema.sql",
            "../migrations/001_initial_schema.sql",
            "backend/migrations/001_initial_schema.sql",
            "./backend/migrations/001_initial_schema.sql",
        ];

        let mut migration_sql = None;
        for path in &migration_paths {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    info!("Found migration file at: {}", path);
                    migration_sql = Some(content);
                    break;
                }
                Err(e) => {
                    debug!("Tried path '{}': {}", path, e);
                }
            }
        }

        let migration_sql = migration_sql.ok_or_else(|| {
            let current_dir = std::env::current_dir()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            error!("Could not find migration file. Current dir: {}", current_dir);
            DatabaseError::MigrationError(format!(
                "Could not find migration file. Current directory: {}. Tried paths: {:?}",
                current_dir, migration_paths
            ))
        })?;

        // Full-line comments only; the schema has no inline `--` inside literals.
        let cleaned_sql: String = migration_sql
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");

        let client = self.client().await?;

        client
            .execute("SELECT pg_advisory_lock($1)", &[&MIGRATION_LOCK_KEY])
            .await?;

        let outcome = client.batch_execute(&cleaned_sql).await;

        if let Err(e) = client
            .execute("SELECT pg_advisory_unlock($1)", &[&MIGRATION_LOCK_KEY])
            .await
        {
            warn!("Failed to release migration lock: {}", e);
        }

        match outcome {
            Ok(()) => {
                info!("Migrations completed successfully");
                Ok(())
            }
            Err(e) => {
                let error_code = e.code().map(|c| c.code().to_string());

                // 42P07 = duplicate_table, 42710 = duplicate_object
                let is_duplicate_error = matches!(error_code.as_deref(), Some("42P07") | Some("42710"));

                if is_duplicate_error {
                    warn!(
                        "Some database objects already exist (error code: {:?}). This is OK if migrations were run before.",
                        error_code
                    );
                    Ok(())
                } else {
                    let detail = e
                        .as_db_error()
                        .and_then(|db_err| db_err.detail())
                        .unwrap_or("No detail available")
                        .to_string();
                    error!("Migration execution error: {} ({:?}): {}", e, error_code, detail);
                    Err(DatabaseError::MigrationError(format!(
                        "Migration execution failed: {} (code {:?}, detail: {})",
                        e, error_code, detail
                    )))
                }
            }
        }
    }

    /// Check out a pooled connection.
    pub async fn client(&self) -> Result<Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }
}

// Re-export commonly used items
pub use models::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_config_error() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = rt.block_on(Database::connect("postgres://user@localhost:notaport/db"));
        assert!(matches!(result, Err(DatabaseError::ConfigError(_))));
    }
}
