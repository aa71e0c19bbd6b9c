//! Database connection module for the VoiceCompanion service
//!
//! SQLite is the only backend. The binary keeps one global pool; tests and
//! embedded callers build their own with [`create_pool`] or
//! [`create_in_memory_pool`].

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;
use tracing::{error, info, warn};

use super::migrations::run_sqlite_migrations;

/// Global database pool used throughout the application
static DB_POOL: OnceCell<DatabasePool> = OnceCell::new();

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    /// SQLite database (file-based or in-memory)
    Sqlite,
}

impl DatabaseType {
    /// Convert from string to database type
    pub fn from_str(s: &str) -> Result<Self, DatabaseError> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(DatabaseType::Sqlite),
            _ => Err(DatabaseError::UnsupportedDatabaseType(s.to_string())),
        }
    }
}

/// Database connection pool
#[derive(Debug, Clone)]
pub enum DatabasePool {
    /// SQLite connection pool
    SQLite(Arc<r2d2::Pool<SqliteConnectionManager>>),
}

impl DatabasePool {
    /// Check out a connection from the pool
    pub fn connection(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, DatabaseError> {
        match self {
            DatabasePool::SQLite(pool) => pool.get().map_err(DatabaseError::SqlitePoolError),
        }
    }
}

/// Database error
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// SQLite connection pool error
    #[error("SQLite connection pool error: {0}")]
    SqlitePoolError(#[from] r2d2::Error),

    /// Database pool already initialized
    #[error("Database pool is already initialized")]
    PoolAlreadyInitialized,

    /// Database pool not initialized
    #[error("Database pool is not initialized")]
    PoolNotInitialized,

    /// Unsupported database type
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),

    /// Migration error
    #[error("Database migration error: {0}")]
    MigrationError(String),

    /// Generic database error
    #[error("Database error: {0}")]
    GenericError(String),
}

impl From<String> for DatabaseError {
    fn from(error: String) -> Self {
        DatabaseError::GenericError(error)
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database type
    pub db_type: DatabaseType,
    /// Path to SQLite database file; `None` or `:memory:` selects an in-memory database
    pub sqlite_path: Option<String>,
    /// Connection pool size
    pub pool_size: u32,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            sqlite_path: Some("./data/voice_companion.db".to_string()),
            pool_size: 5,
            max_connections: 10,
            timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration from environment variables
    pub fn from_env() -> Result<Self, DatabaseError> {
        let db_type_str = env::var("DB_TYPE").unwrap_or_else(|_| "sqlite".to_string());
        let db_type = DatabaseType::from_str(&db_type_str)?;

        let sqlite_path = env::var("DB_SQLITE_PATH").ok();
        match sqlite_path {
            Some(ref path) => info!("Using SQLite database at: {}", path),
            None => info!("No DB_SQLITE_PATH provided, will use default path: data/voice_companion.db"),
        }

        let pool_size = env::var("DB_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(20);

        let timeout_seconds = env::var("DB_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        info!(
            "Database configuration: pool_size={}, max_connections={}, timeout={}s",
            pool_size, max_connections, timeout_seconds
        );

        Ok(DatabaseConfig {
            db_type,
            sqlite_path,
            pool_size,
            max_connections,
            timeout_seconds,
        })
    }

    fn is_in_memory(&self) -> bool {
        matches!(self.sqlite_path.as_deref(), Some(":memory:"))
    }
}

/// Initialize the global database connection pool and run migrations
pub fn initialize_database_pool() -> Result<(), DatabaseError> {
    if DB_POOL.get().is_some() {
        return Err(DatabaseError::PoolAlreadyInitialized);
    }

    let config = DatabaseConfig::from_env()?;
    info!("Initializing database pool with type: {:?}", config.db_type);

    let pool = create_pool(&config)?;
    DB_POOL
        .set(pool)
        .map_err(|_| DatabaseError::PoolAlreadyInitialized)
}

/// Get the global database connection pool
pub fn get_db_pool() -> Result<DatabasePool, DatabaseError> {
    DB_POOL.get().cloned().ok_or(DatabaseError::PoolNotInitialized)
}

/// Build a pool from configuration and bring its schema up to date.
///
/// A file database that cannot be opened degrades to an in-memory one so the
/// service still starts.
pub fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    let pool = match config.db_type {
        DatabaseType::Sqlite if config.is_in_memory() => initialize_in_memory_sqlite_pool(config)?,
        DatabaseType::Sqlite => initialize_sqlite_pool(config)?,
    };
    run_migrations(&pool)?;
    Ok(pool)
}

/// Fresh in-memory database with the schema applied
pub fn create_in_memory_pool() -> Result<DatabasePool, DatabaseError> {
    let config = DatabaseConfig {
        sqlite_path: Some(":memory:".to_string()),
        timeout_seconds: 5,
        ..DatabaseConfig::default()
    };
    create_pool(&config)
}

fn initialize_sqlite_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    let sqlite_path = config
        .sqlite_path
        .clone()
        .unwrap_or_else(|| "data/voice_companion.db".to_string());

    info!("Initializing SQLite database at: {}", sqlite_path);

    if let Some(parent) = Path::new(&sqlite_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating parent directory: {:?}", parent);
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create directory: {}, falling back to in-memory database", e);
                return initialize_in_memory_sqlite_pool(config);
            }
        }
    }

    let manager = SqliteConnectionManager::file(&sqlite_path)
        .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));

    match r2d2::Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(config.timeout_seconds))
        .build(manager)
    {
        Ok(pool) => match pool.get() {
            Ok(_) => {
                info!("SQLite connection pool created successfully");
                Ok(DatabasePool::SQLite(Arc::new(pool)))
            }
            Err(e) => {
                error!("Failed to connect to SQLite database: {}", e);
                warn!("Falling back to in-memory SQLite database");
                initialize_in_memory_sqlite_pool(config)
            }
        },
        Err(e) => {
            error!("Failed to create SQLite connection pool: {}", e);
            warn!("Falling back to in-memory SQLite database");
            initialize_in_memory_sqlite_pool(config)
        }
    }
}

/// Every connection to `:memory:` opens a separate database, so the pool holds exactly one.
fn initialize_in_memory_sqlite_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!("Initializing in-memory SQLite database");

    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    let pool = r2d2::Pool::builder()
        .max_size(1)
        .connection_timeout(Duration::from_secs(config.timeout_seconds))
        .build(manager)?;

    Ok(DatabasePool::SQLite(Arc::new(pool)))
}

/// Run database migrations against a pool
pub fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    info!("Running database migrations");

    let conn = pool.connection()?;
    run_sqlite_migrations(&conn).map_err(DatabaseError::MigrationError)?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// Describe a pool for health reporting
pub fn describe_pool(pool: &DatabasePool) -> String {
    match pool {
        DatabasePool::SQLite(inner) => {
            let location = match pool.connection() {
                Ok(conn) => match conn.query_row("PRAGMA database_list", [], |row| row.get::<_, String>(2)) {
                    Ok(path) if path.is_empty() || path == ":memory:" => "SQLite in-memory database".to_string(),
                    Ok(path) => format!("SQLite database at {}", path),
                    Err(_) => "SQLite database (path unknown)".to_string(),
                },
                Err(e) => {
                    error!("Failed to get SQLite connection: {}", e);
                    return format!("SQLite connection error: {}", e);
                }
            };

            let state = inner.state();
            format!(
                "{} (connections: active={}, idle={})",
                location, state.connections, state.idle_connections
            )
        }
    }
}

/// Get information about the global database connection
pub fn get_connection_info() -> Option<String> {
    DB_POOL.get().map(describe_pool)
}
