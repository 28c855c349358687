//! SQLite audit trail.
//!
//! Two tables, created on startup if missing:
//!
//! - `trade_plans`: one row per accepted request. The loop and amounts are
//!   stored as their wire JSON, `status` is the last status reported for the
//!   plan and `auth_token` is unique across all plans.
//! - `action_logs`: one row per reported step, keyed to its plan. Rows of the
//!   same run share `start_time`; `id` order is emission order.

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub type DbPool = SqlitePool;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/pankow.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Schema statements, applied in order. Each one is idempotent.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "trade_plans",
        r#"
        CREATE TABLE IF NOT EXISTS trade_plans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            auth_token TEXT NOT NULL UNIQUE,
            loop_json TEXT NOT NULL,
            amounts_json TEXT NOT NULL,
            exec_type TEXT NOT NULL CHECK(exec_type IN ('sequential', 'parallel')),
            check_balance BOOLEAN NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "action_logs",
        r#"
        CREATE TABLE IF NOT EXISTS action_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trade_plan_id INTEGER NOT NULL REFERENCES trade_plans(id),
            start_time DATETIME NOT NULL,
            timestamp DATETIME NOT NULL,
            exchange TEXT NOT NULL,
            loop_num INTEGER NOT NULL,
            loop_tag TEXT NOT NULL,
            status TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            details TEXT NOT NULL
        )
        "#,
    ),
    (
        "idx_trade_plans_owner",
        "CREATE INDEX IF NOT EXISTS idx_trade_plans_owner ON trade_plans(owner_id)",
    ),
    (
        "idx_action_logs_plan",
        "CREATE INDEX IF NOT EXISTS idx_action_logs_plan ON action_logs(trade_plan_id, start_time)",
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Failed to create data directory {path}: {reason}")]
    DataDirectory { path: String, reason: String },

    #[error("Migration {name} failed: {reason}")]
    MigrationError { name: String, reason: String },
}

/// Open the pool described by `config` and bring the schema up to date.
pub async fn init_database(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Opening audit database {}", config.url);

    if let Some(file) = config.url.strip_prefix("sqlite://") {
        if let Some(dir) = Path::new(file).parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| DatabaseError::DataDirectory {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let options = if config.log_queries {
        options.log_statements(tracing::log::LevelFilter::Debug)
    } else {
        options.disable_statement_logging()
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    info!("✓ Audit database ready");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    for (name, statement) in MIGRATIONS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Migration {} applied", name);
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite://data/pankow.db`
    pub url: String,
    pub max_connections: u32,
    /// Log every statement at debug level
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    /// Private in-memory database. Limited to one connection so every query
    /// sees the same database.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            log_queries: false,
        }
    }

    /// `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and `DATABASE_LOG_QUERIES`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.url = url;
        }

        if let Some(value) = lookup("DATABASE_MAX_CONNECTIONS") {
            match value.parse::<u32>() {
                Ok(n) if n > 0 => config.max_connections = n,
                _ => tracing::warn!(
                    "Invalid DATABASE_MAX_CONNECTIONS '{}', using default: {}",
                    value,
                    config.max_connections
                ),
            }
        }

        if let Some(value) = lookup("DATABASE_LOG_QUERIES") {
            match value.parse::<bool>() {
                Ok(flag) => config.log_queries = flag,
                Err(_) => tracing::warn!(
                    "Invalid DATABASE_LOG_QUERIES '{}', using default: {}",
                    value,
                    config.log_queries
                ),
            }
        }

        config
    }
}
