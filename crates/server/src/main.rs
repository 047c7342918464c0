use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use spout_core::LinkBuilder;
use spout_gateway::GatewayBuilder;
use spout_server::api::AppState;
use spout_server::backend_factory;
use spout_server::config::SpoutConfig;
use spout_store::{MemoryFileStore, MemoryOwnerStats, MemorySessionStore};

/// Spout streaming gateway HTTP server.
#[derive(Parser, Debug)]
#[command(name = "spout-server", about = "Standalone HTTP server for Spout")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "spout.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from TOML file, or use defaults if the file does not exist.
    let config: SpoutConfig = if Path::new(&cli.config).exists() {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        toml::from_str("")?
    };

    // Initialize tracing subscriber (with optional OpenTelemetry layer).
    // Must happen after config is loaded so we know whether OTel is enabled,
    // but before any tracing calls.
    let telemetry_guard = spout_server::telemetry::init(&config.telemetry);

    if !Path::new(&cli.config).exists() {
        info!(
            path = %cli.config,
            "config file not found, using defaults"
        );
    }

    // Resolve the bind address (CLI overrides take precedence).
    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    // Verify backend connections and split capabilities.
    let pool = backend_factory::create_pool(&config.backend).await?;
    info!(
        backend = %config.backend.backend,
        channel_id = config.backend.channel_id,
        workers = pool.sender_count(),
        "worker pool verified"
    );

    let files = Arc::new(MemoryFileStore::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let owners = Arc::new(MemoryOwnerStats::new());

    let gateway = Arc::new(
        GatewayBuilder::new()
            .pool(Arc::clone(&pool))
            .files(files)
            .sessions(sessions)
            .owners(owners)
            .token_length(config.links.token_length)
            .build()?,
    );

    // Public links prefer the configured external URL over the bind address.
    let external_url = config
        .links
        .external_url
        .clone()
        .unwrap_or_else(|| format!("http://{addr}"));
    let links = LinkBuilder::new(external_url);

    // Register the demo file so a fresh install has a playable link.
    if config.backend.demo && config.backend.backend == "memory" {
        let record = gateway
            .register_file(backend_factory::DEMO_MESSAGE_ID, 0)
            .await?;
        info!(
            url = %links.player_url(record.message_id, &record.public_token),
            "demo file registered"
        );
    }

    // Spawn the stale-session sweeper.
    let _sweeper_handle = if config.sessions.enabled {
        let interval = Duration::from_secs(config.sessions.interval_seconds);
        let window = Duration::from_secs(config.sessions.stale_after_seconds);
        let sweep_gateway = Arc::clone(&gateway);
        Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so we don't
            // sweep at startup.
            timer.tick().await;
            loop {
                timer.tick().await;
                match sweep_gateway.sweep_sessions(window).await {
                    Ok(0) => {}
                    Ok(n) => info!(removed = n, "session sweep closed stale sessions"),
                    Err(e) => tracing::warn!(error = %e, "session sweep failed"),
                }
            }
        }))
    } else {
        None
    };

    let state = AppState::new(Arc::clone(&gateway), links)?;
    let app = spout_server::api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "spout-server listening");

    // Serve with graceful shutdown on SIGINT / SIGTERM.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Wait for pending accounting tasks (with configurable timeout).
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    info!(
        timeout_secs = config.server.shutdown_timeout_seconds,
        "waiting for pending accounting tasks..."
    );
    if tokio::time::timeout(shutdown_timeout, gateway.shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = config.server.shutdown_timeout_seconds,
            "shutdown timeout exceeded, some byte counts may be lost"
        );
    }

    // Flush pending OpenTelemetry spans before exit.
    telemetry_guard.shutdown();

    info!("spout-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
