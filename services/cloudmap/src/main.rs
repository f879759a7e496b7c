//! World cloud-cover map builder.
//!
//! Downloads the latest infrared images of several weather satellites,
//! reprojects them onto one equirectangular grid and blends them into a
//! single cloud map, suitable as an xplanet cloud layer.
//!
//! `cloudmap live` instead fetches a prebuilt map from a public service.

mod config;
mod live;
mod output;
mod run;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::CloudmapConfig;
use live::{LiveMap, LiveOutcome, LiveResolution};
use run::{RunOptions, RunOutcome};

#[derive(Parser, Debug)]
#[command(name = "cloudmap", version)]
#[command(about = "Create a world cloud map from the latest satellite images")]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "CLOUDMAP_CONFIG", default_value = "config/cloudmap.yaml")]
    config: PathBuf,

    /// Recreate the cloud map even if it is newer than all images
    #[arg(short, long)]
    force: bool,

    /// Store intermediate rasters in the cache directory
    #[arg(short, long)]
    debug: bool,

    /// Number of projection workers (overrides processing.workers)
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, env = "CLOUDMAP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a prebuilt cloud map instead of compositing one
    Live {
        /// Map size, one of 1024x512, 2048x1024, 4096x2048, 8192x4096
        #[arg(long, default_value = "2048x1024")]
        resolution: LiveResolution,

        /// Output file (defaults to clouds_<width>.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let start = Instant::now();

    match args.command {
        Some(Command::Live { resolution, output }) => {
            let path = output.unwrap_or_else(|| PathBuf::from(resolution.file_name()));
            let map = LiveMap::new(resolution, Duration::from_secs(20))?;
            info!(url = %map.url(), path = %path.display(), "Fetching live cloud map");
            match map.download(&path, args.force).await? {
                LiveOutcome::Downloaded { modified } => {
                    info!(%modified, "Live cloud map updated")
                }
                LiveOutcome::UpToDate { modified } => {
                    info!(%modified, "Live cloud map already current")
                }
            }
        }
        None => {
            let config = CloudmapConfig::load(&args.config)?;
            let options = RunOptions {
                force: args.force,
                debug: args.debug,
                workers: args.workers,
            };
            info!(
                satellites = config.satellites.len(),
                workers = options.workers.unwrap_or(config.processing.workers),
                interpolation = %config.processing.interpolation,
                output = %config.output_path().display(),
                "Starting cloud map run"
            );
            match run::run(&config, options, chrono::Utc::now()).await? {
                RunOutcome::Written {
                    timestamp,
                    modified,
                } => info!(%timestamp, %modified, "Cloud map created"),
                RunOutcome::UpToDate { timestamp } => {
                    info!(%timestamp, "Cloud map already up to date")
                }
            }
        }
    }

    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Finished");
    Ok(())
}
