//! Lakelog server
//!
//! Serves the coordinated commits API for managed Delta tables, backed by a
//! local redb metadata store.

use anyhow::{Context, Result};
use clap::Parser;
use lakelog_commits::{CommitsState, router};
use lakelog_common::Config;
use lakelog_meta_store::MetaStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Lakelog coordinated commits server
#[derive(Parser, Debug)]
#[command(name = "lakelog-server")]
#[command(about = "Coordinated commits catalog for managed Delta tables")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "LAKELOG_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.listen`
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// redb database file, overrides `store.path`
    #[arg(long)]
    data_path: Option<PathBuf>,

    /// Keep all state in memory (for development)
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lakelog server");

    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(path) = args.data_path {
        config.store.path = path;
    }

    let store = if args.in_memory {
        info!("Using in-memory metadata store");
        MetaStore::open_in_memory()
    } else {
        info!("Metadata store: {}", config.store.path.display());
        MetaStore::open(&config.store.path)
    }
    .context("opening metadata store")?;

    info!(
        "Commit ceiling {} per table, trim batch size {}, max trim batches {}",
        config.commits.max_commits_per_table,
        config.commits.delete_batch_size,
        config.commits.delete_max_retries
    );

    let state = CommitsState::new(Arc::new(store), config.commits);
    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = config.server.listen;
    info!("Starting coordinated commits API on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("Lakelog server shut down gracefully");

    Ok(())
}
