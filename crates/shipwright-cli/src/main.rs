mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use shipwright_core::app::AppBuilder;
use shipwright_core::config::Config;

use crate::server::{AppState, router};

/// Shipwright - generate, publish and host single-page apps on request
#[derive(Parser, Debug)]
#[command(name = "shipwright")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on (overrides SHIPWRIGHT_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Number of concurrent rounds (overrides SHIPWRIGHT_WORKERS)
    #[arg(long)]
    workers: Option<usize>,

    /// Parent directory of the per-task working directories
    #[arg(long)]
    work_root: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a second init (tests, embedding) is harmless
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .try_init();
}

fn load_config(args: Args) -> Result<Config> {
    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(workers) = args.workers {
        anyhow::ensure!(workers > 0, "--workers must be at least 1");
        config.queue.workers = workers;
    }
    if let Some(root) = args.work_root {
        config.work_root = root;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = load_config(Args::parse())?;
    info!(?config, "starting");

    tokio::fs::create_dir_all(&config.work_root)
        .await
        .with_context(|| format!("failed to create {}", config.work_root.display()))?;

    let bind = config.bind;
    let secret: Arc<str> = Arc::from(config.shared_secret.as_str());
    let app = AppBuilder::new(config).build();
    let workers = app.spawn_workers();
    let gc = app.spawn_gc();

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(addr = %bind, "listening");

    let state = AppState {
        queue: Arc::clone(&app.queue),
        secret,
    };
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("server error")?;

    // in-flight rounds finish; queued ones are dropped with the process
    workers.shutdown_and_join().await;
    gc.shutdown_and_join().await;
    info!("stopped");
    Ok(())
}
