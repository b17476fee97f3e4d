use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use farmcred_server::{AppState, FarmCredConfig, router};
use farmcred_workflow::VisitScheduler;

#[derive(Parser)]
#[command(name = "farmcred-server", about = "Farm verification and identity API")]
struct Cli {
    /// Address to listen on, overriding the config file.
    #[arg(long)]
    bind: Option<String>,

    /// State directory (defaults to $FARMCRED_STATE_DIR or ~/.farmcred).
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Config file (defaults to <state-dir>/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep everything in memory instead of writing state.json.
    #[arg(long)]
    ephemeral: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("farmcred=info,tower_http=info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(%e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let state_dir = cli
        .state_dir
        .unwrap_or_else(FarmCredConfig::default_state_dir);
    let config_path = cli
        .config
        .unwrap_or_else(|| FarmCredConfig::config_path(&state_dir));
    let mut config = FarmCredConfig::load(&config_path)?;
    config.apply_env();
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if cli.ephemeral {
        config.persist = false;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::from_config(&config, &state_dir, shutdown_rx.clone())?;

    let scheduler = VisitScheduler::new(
        Arc::clone(&state.workflow),
        Duration::from_secs(config.scheduler_interval_secs.max(1)),
        shutdown_rx,
    );
    let scheduler_handle = tokio::spawn(scheduler.run());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "farmcred server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("Server error")?;

    scheduler_handle.await.context("Visit scheduler panicked")?;
    Ok(())
}
