pub mod api;
pub mod cli;
pub mod config;
pub mod credential;
pub mod db;
pub mod entities;
pub mod error;
pub mod filestore;
pub mod models;
pub mod scheduler;
pub mod services;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
pub use config::Config;
use db::Store;
use scheduler::SessionSweeper;
use services::{SeaOrmSessionService, SessionService};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    init_tracing(&config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::SweepSessions => run_sweep(config).await,
        Commands::CheckConfig => {
            println!("Config OK: serving {} on {}", config.root, config.bind_address());
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_sweep(config: Config) -> anyhow::Result<()> {
    let store = Store::new(&config.database_path).await?;
    let sessions: Arc<dyn SessionService> = Arc::new(SeaOrmSessionService::new(
        store,
        config.session_lifetime(),
        config.session.key_bytes,
    ));

    let sweeper = SessionSweeper::new(sessions, config.session);
    let removed = sweeper.run_once().await?;
    println!("Removed {removed} expired session(s)");
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    let bind_address = config.bind_address();
    let session_config = config.session.clone();

    let state = api::create_app_state_from_config(config, prometheus_handle).await?;
    state.store.ping().await.context("Database health check failed")?;

    let sweeper = Arc::new(SessionSweeper::new(
        Arc::clone(&state.sessions),
        session_config,
    ));
    let sweeper_task = {
        let sweeper = Arc::clone(&sweeper);
        tokio::spawn(async move {
            if let Err(e) = sweeper.start().await {
                error!("Session sweeper error: {}", e);
            }
        })
    };

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.stop().await;
    if let Err(e) = sweeper_task.await {
        error!("Session sweeper task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
