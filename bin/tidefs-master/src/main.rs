//! tidefs Master - metadata and replica balancing service

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tidefs_common::Config;
use tidefs_master::{Master, serve};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tidefs-master")]
#[command(about = "tidefs master service")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/tidefs/master.toml")]
    config: String,

    /// Listen address (overrides the configuration file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Storage node address, repeat for every node (replaces the configured list)
    #[arg(short, long = "storage")]
    storages: Vec<String>,

    /// Block size in bytes
    #[arg(long)]
    block_size: Option<u64>,

    /// Disable the periodic balancer
    #[arg(long)]
    no_balancer: bool,

    /// Log level (defaults to the configured level)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Configuration file merged with the command line
    fn config(&self) -> Result<Config> {
        let mut config = if Path::new(&self.config).exists() {
            Config::load(&self.config)?
        } else {
            Config::default()
        };
        if let Some(listen) = &self.listen {
            config.master.listen.clone_from(listen);
        }
        if !self.storages.is_empty() {
            config.master.storages.clone_from(&self.storages);
        }
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if self.no_balancer {
            config.master.dynamic_replication = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tidefs master");
    info!("Storage nodes: {:?}", config.master.storages);

    let listen = config.master.listen.clone();
    let master = Arc::new(Master::connect(config)?);
    let balancer = master.spawn_background();

    let listener = TcpListener::bind(&listen).await?;
    info!("Master listening on {}", listener.local_addr()?);

    serve(listener, Arc::clone(&master), async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    })
    .await?;

    if let Some(balancer) = balancer {
        balancer.abort();
    }
    info!("Master shut down gracefully, {} files forgotten", master.store().len());

    Ok(())
}
