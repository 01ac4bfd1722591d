//! PENNY knowledge-core gateway
//!
//! Serves the reconciliation engine over HTTP. Every profile in the
//! configured fleet is routed to its own identity node; writes to each node
//! are serialized and drained on shutdown.
//!
//! Usage:
//!   penny-gateway --config penny.toml --bind 0.0.0.0:8080

use anyhow::{Context, Result};
use clap::Parser;
use penny_fleet::ProfileRouter;
use penny_gateway::{AppState, GatewayConfig, build_router};
use penny_ontology::KnowledgeCore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "penny-gateway")]
#[command(about = "PENNY knowledge-core HTTP gateway")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the configuration file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("PENNY gateway starting...");

    let mut config =
        GatewayConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.fleet.apply_env_overrides();
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    config
        .engine
        .validate()
        .context("Invalid engine configuration")?;

    let router =
        ProfileRouter::from_config(&config.fleet).context("Invalid fleet configuration")?;
    info!(
        default_profile = %router.default_profile(),
        profiles = config.fleet.profiles.len(),
        "Fleet ready"
    );

    let core = KnowledgeCore::new(Arc::new(router), &config.engine);
    let state = Arc::new(
        AppState::new(core).with_session_limits(config.max_sessions, config.session_idle()),
    );
    let app = build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("HTTP API listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Draining write queues...");
    if state.core.shutdown().await {
        info!("All queued writes completed");
    } else {
        warn!("Drain timed out, remaining writes were cancelled");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
