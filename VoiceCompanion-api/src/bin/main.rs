use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use voice_companion_api::api::{create_application, handlers::initialize_server_start_time};
use voice_companion_data::config_tables::ConfigTables;
use voice_companion_data::database::{get_db_pool, initialize_database_pool};
use voice_companion_domain::auth::token_blacklist;
use voice_companion_domain::services::interactions::DEFAULT_RETENTION_DAYS;
use voice_companion_domain::services::sessions::SESSION_MAX_AGE_HOURS;
use voice_companion_domain::services::Services;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const INTERACTION_SWEEP_EVERY: u32 = 24;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Start the VoiceCompanion API server: database, configuration tables,
/// providers, background maintenance and the HTTP/WebSocket listener.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        eprintln!("Warning: .env file not found or couldn't be read. Using environment variables.");
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_ansi(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stdout),
        )
        .with(env_filter)
        .init();

    info!("🚀 Starting VoiceCompanion API server");

    let data_dir = PathBuf::from(env_or("DATA_DIR", "data"));
    if !data_dir.exists() {
        info!("Creating data directory: {}", data_dir.display());
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    }
    if std::env::var("DB_SQLITE_PATH").is_err() {
        let db_path = data_dir.join("voice_companion.db");
        std::env::set_var("DB_SQLITE_PATH", db_path.to_string_lossy().to_string());
        info!("Set DB_SQLITE_PATH to {}", db_path.display());
    }

    initialize_database_pool().context("initializing database pool")?;
    let pool = get_db_pool().context("fetching database pool")?;
    info!("Database pool initialized successfully");

    let excel_dir = std::env::var("CONFIG_EXCEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join("excel"));
    let config = Arc::new(ConfigTables::from_directory(&excel_dir));
    let loaded = config.reload_all_configs();
    let failed: Vec<&String> = loaded.iter().filter(|(_, ok)| !**ok).map(|(name, _)| name).collect();
    if failed.is_empty() {
        info!(tables = loaded.len(), dir = %excel_dir.display(), "Configuration tables loaded");
    } else {
        warn!(?failed, dir = %excel_dir.display(), "Some configuration tables failed to load");
    }

    let watch_secs = env_or("CONFIG_WATCH_INTERVAL_SECS", "2")
        .parse::<u64>()
        .context("CONFIG_WATCH_INTERVAL_SECS must be a number of seconds")?;
    config.clone().watch_and_reload(Duration::from_secs(watch_secs));

    let services = Services::from_env(pool, config).context("configuring AI providers")?;

    token_blacklist::start_cleanup_task();
    spawn_maintenance(services.clone());
    initialize_server_start_time();

    let app = create_application(services);

    let host = env_or("HOST", "0.0.0.0");
    let port = env_or("PORT", "8000").parse::<u16>().context("PORT must be a number")?;
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", host, port))?;
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Hourly sweep of stale sessions; interaction logs are pruned once a day
fn spawn_maintenance(services: Services) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        let mut ticks: u32 = 0;
        loop {
            interval.tick().await;
            match services.sessions.cleanup_expired_sessions(SESSION_MAX_AGE_HOURS).await {
                Ok(closed) if closed > 0 => info!(closed, "Closed expired sessions"),
                Ok(_) => {}
                Err(e) => error!("Session cleanup failed: {}", e),
            }
            if ticks % INTERACTION_SWEEP_EVERY == 0 {
                match services.interactions.cleanup(DEFAULT_RETENTION_DAYS).await {
                    Ok(removed) => info!(removed, "Pruned interaction logs"),
                    Err(e) => error!("Interaction log cleanup failed: {}", e),
                }
            }
            ticks = ticks.wrapping_add(1);
        }
    });
}

/// Resolves on CTRL+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
}
