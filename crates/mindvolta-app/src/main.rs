//! MindVolta application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Open the SQLite conversation store
//! 3. Build the connection registry, response catalog, and dispatcher
//! 4. Serve the HTTP and WebSocket API until ctrl-c or SIGTERM
//! 5. Cancel pending push deliveries on the way out

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use mindvolta_api::auth::generate_token;
use mindvolta_api::{routes, AppState, TokenTable};
use mindvolta_chat::{ConnectionRegistry, Dispatcher, StaticResponseCatalog};
use mindvolta_core::config::MindvoltaConfig;
use mindvolta_core::types::AGENT_SENTINEL;
use mindvolta_storage::{Database, SqliteConversationStore};

use crate::cli::{CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Resolves when the process receives ctrl-c or (on unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}

/// Generate a token for `user_id` and record it in the config file.
///
/// An existing file must parse; it is never replaced by defaults.
fn issue_token(config_file: &Path, user_id: &str) -> Result<String, Box<dyn std::error::Error>> {
    if user_id.trim().is_empty() || user_id == AGENT_SENTINEL {
        return Err(format!("'{}' cannot be issued a token", user_id).into());
    }

    let mut config = if config_file.exists() {
        MindvoltaConfig::load(config_file)?
    } else {
        MindvoltaConfig::default()
    };

    let token = generate_token();
    config.auth.tokens.insert(token.clone(), user_id.to_string());
    config.save(config_file)?;
    tracing::info!(user = %user_id, path = %config_file.display(), "Token issued");
    Ok(token)
}

async fn serve(config: MindvoltaConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("mindvolta.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let store = Arc::new(SqliteConversationStore::new(db));

    // Dispatch pipeline.
    let registry = Arc::new(ConnectionRegistry::new());
    let catalog = Arc::new(StaticResponseCatalog::new(&config.chat.referral));
    let dispatcher = Arc::new(Dispatcher::new(
        store,
        catalog,
        Arc::clone(&registry),
        config.chat.clone(),
    ));
    tracing::info!(
        delay_ms = config.chat.response_delay_ms,
        history_limit = config.chat.history_limit,
        "Dispatcher ready"
    );

    let identity = TokenTable::from_config(&config.auth);
    if identity.is_empty() {
        tracing::warn!("No API tokens configured; run `mindvolta issue-token <user_id>`");
    }

    let state = AppState::new(
        config.clone(),
        Arc::clone(&dispatcher),
        registry,
        Arc::new(identity),
    );

    // === API server ===

    if let Err(e) = routes::start_server(&config, state, shutdown_signal()).await {
        tracing::error!(
            addr = %format!("{}:{}", config.server.host, config.server.port),
            error = %e,
            "Server stopped with an error"
        );
        dispatcher.shutdown().await;
        return Err(e.into());
    }

    dispatcher.shutdown().await;
    tracing::info!("MindVolta stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = MindvoltaConfig::load_or_default(&config_file);

    // Tracing: RUST_LOG wins, then --log-level, then the config value.
    let default_level = args
        .resolve_log_level()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&default_level)),
        )
        .init();

    if let Command::IssueToken { user_id } = args.command() {
        let token = issue_token(&config_file, &user_id)?;
        println!("{}", token);
        return Ok(());
    }

    tracing::info!("Starting MindVolta v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    config.server.port = args.resolve_port(config.server.port);
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }

    serve(config).await
}
