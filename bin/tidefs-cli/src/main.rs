//! tidefs CLI - put and get whole files

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tidefs_client::Client;
use tidefs_common::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tidefs-cli")]
#[command(about = "tidefs command line client")]
#[command(version)]
struct Args {
    /// Master address
    #[arg(short, long, default_value = "127.0.0.1:9100", env = "TIDEFS_MASTER")]
    master: String,

    /// Configuration file path, read for the block size
    #[arg(short, long, default_value = "/etc/tidefs/master.toml")]
    config: String,

    /// Block size in bytes (overrides the configuration file)
    #[arg(long)]
    block_size: Option<u64>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a local file
    Put {
        /// Local file to upload
        path: PathBuf,
        /// Name in tidefs (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
        /// Replication factor
        #[arg(short, long, default_value = "3")]
        rfactor: u64,
    },
    /// Fetch a file
    Get {
        /// Name in tidefs
        name: String,
        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn block_size(args: &Args) -> Result<u64> {
    if let Some(block_size) = args.block_size {
        return Ok(block_size);
    }
    if Path::new(&args.config).exists() {
        return Ok(Config::load(&args.config)?.block_size);
    }
    Ok(Config::default().block_size)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = Client::new(args.master.clone(), block_size(&args)?)?;

    match &args.command {
        Commands::Put {
            path,
            name,
            rfactor,
        } => {
            let name = match name {
                Some(name) => name.clone(),
                None => path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .context("cannot derive a name from the path, pass --name")?,
            };
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let size = data.len();
            client.create(&name, Bytes::from(data), *rfactor).await?;
            info!("Stored {name} ({size} bytes)");
            println!("{name}: {size} bytes stored");
        }
        Commands::Get { name, output } => {
            let data = client.read(name).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(path, &data)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!("Fetched {name} ({} bytes)", data.len());
                }
                None => {
                    use tokio::io::AsyncWriteExt;
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
    }

    Ok(())
}
