//! `flux` CLI - resolve, rank and race streams from the command line

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "flux")]
#[command(about = "Stream resolution: addon aggregation, ranking and racing")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/flux/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Content selection shared by `resolve` and `candidates`.
#[derive(clap::Args)]
pub struct Target {
    /// External catalog ID (e.g. tt0111161)
    id: String,

    /// Title used to filter addon results
    #[arg(short, long)]
    title: String,

    /// Season number (implies a series)
    #[arg(short, long)]
    season: Option<u32>,

    /// Episode number (defaults to 1 for series)
    #[arg(short, long)]
    episode: Option<u32>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve content to a single playable URL
    Resolve {
        #[command(flatten)]
        target: Target,
    },

    /// List ranked candidates from all addons
    Candidates {
        #[command(flatten)]
        target: Target,

        /// Addon to rank first, as if picked by the user
        #[arg(long)]
        sticky: Option<String>,
    },

    /// Race URLs through a racing worker
    Race {
        /// Racing worker endpoint
        endpoint: String,

        /// Candidate URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },

    /// Check whether a stream URL is still served
    Probe {
        /// Stream URL
        url: String,

        /// Timeout in seconds
        #[arg(long, default_value = "3")]
        timeout: u64,
    },

    /// Show the effective configuration
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays pipeable
    let default_level = if cli.verbose { "flux=debug" } else { "flux=warn" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config_path = cli.config.unwrap_or_else(flux::config::config_path);

    match cli.command {
        Commands::Resolve { target } => {
            cmd::resolve::cmd_resolve(&config_path, &target).await?;
        }
        Commands::Candidates { target, sticky } => {
            cmd::candidates::cmd_candidates(&config_path, &target, sticky.as_deref()).await?;
        }
        Commands::Race {
            endpoint,
            urls,
            timeout,
        } => {
            cmd::race::cmd_race(&endpoint, &urls, timeout).await?;
        }
        Commands::Probe { url, timeout } => {
            cmd::probe::cmd_probe(&url, timeout).await?;
        }
        Commands::Config { path } => {
            cmd::config::cmd_config(&config_path, path)?;
        }
    }

    Ok(())
}
