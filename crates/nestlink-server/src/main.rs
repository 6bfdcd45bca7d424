use std::env;
use std::sync::Arc;
use std::time::Duration;

use nestlink_db_memory::MemoryInviteStorage;
use nestlink_server::config::{StorageBackend, load_config};
use nestlink_server::{AppState, build_router};
use nestlink_storage::InviteStorage;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From NESTLINK_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (nestlink.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (NESTLINK_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present, before anything reads the environment.
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    nestlink_server::observability::init_tracing(&cfg.logging.level);

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );

    let storage: Arc<dyn InviteStorage> = match cfg.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryInviteStorage::new()),
        StorageBackend::Postgres => {
            let Some(url) = cfg.storage.database_url.as_deref() else {
                eprintln!("Configuration error: storage.database_url required for postgres");
                std::process::exit(2);
            };
            match nestlink_db_postgres::PostgresInviteStorage::connect(url).await {
                Ok(storage) => {
                    if let Err(e) = storage.migrate().await {
                        eprintln!("Migration failed: {e}");
                        std::process::exit(2);
                    }
                    Arc::new(storage)
                }
                Err(e) => {
                    eprintln!("Database connection failed: {e}");
                    std::process::exit(2);
                }
            }
        }
    };
    tracing::info!(backend = storage.backend_name(), "Storage ready");

    let state = AppState::from_config(storage, &cfg);
    let router = build_router(state, Duration::from_secs(cfg.server.request_timeout_secs));

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind {addr}: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(address = %addr, "Listening");

    if let Err(err) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("Server error: {err}");
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: NESTLINK_CONFIG
/// 3. Default: nestlink.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("NESTLINK_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    ("nestlink.toml".to_string(), ConfigSource::Default)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
