//! tidefs Storage - block storage node
//!
//! Holds block replicas in memory and copies them to other storage nodes on
//! the master's request.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tidefs_common::Config;
use tidefs_storage::{Storage, router};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tidefs-storage")]
#[command(about = "tidefs block storage node")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/tidefs/storage.toml")]
    config: String,

    /// Listen address (overrides the configuration file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = if Path::new(&args.config).exists() {
        info!("Loading configuration from {}", args.config);
        Config::load(&args.config)?
    } else {
        Config::default()
    };
    if let Some(listen) = args.listen {
        config.storage.listen = listen;
    }

    info!("Starting tidefs storage node");

    let storage = Arc::new(Storage::new());
    let app = router(Arc::clone(&storage));

    let listener = TcpListener::bind(&config.storage.listen).await?;
    info!("Storage node listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("Storage node shut down, {} blocks dropped", storage.len());

    Ok(())
}
