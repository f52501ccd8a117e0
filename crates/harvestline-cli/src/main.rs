//! harvestline - harvest SRU records and publish them as dataset shards
//!
//! `harvest` pages through an SRU search service and stages one XML file per
//! record; `publish` uploads the staged files to a Hugging Face dataset as
//! JSON-lines shards. Both resume from persisted progress.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "harvestline")]
#[command(about = "Resumable SRU harvester and dataset shard publisher")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./harvestline.toml or ~/.config/harvestline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Maximum attempts per request, including the first
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Base backoff delay in seconds (doubled on every retry)
    #[arg(long, global = true)]
    retry_base_secs: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest SRU records into one XML file per record
    Harvest(cmd::harvest::HarvestArgs),
    /// Publish staged records to a Hugging Face dataset as JSONL shards
    Publish(cmd::publish::PublishArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    // before parsing, so HF_TOKEN and SRU_URL from .env reach the `env` fallbacks
    let env_file = config::find_env_file();
    if let Some(path) = &env_file {
        config::load_env_file(path)?;
    }
    let cli = Cli::parse();

    let progress = Arc::new(harvestline_core::ProgressContext::new());

    // TTY: warn unless --debug, the progress lines show activity.
    // Non-TTY: info, logs are the only progress indicator.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = is_tty && !cli.debug;
    harvestline_core::init_logging(quiet, cli.debug, multi);
    if let Some(path) = &env_file {
        log::debug!("Loaded environment from {}", path.display());
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    harvestline_core::set_http_config(config.http.http_config());
    let retry = config
        .http
        .retry_policy(cli.max_retries, cli.retry_base_secs);

    match cli.command {
        Command::Harvest(args) => cmd::harvest::run(args, &config, retry, &progress),
        Command::Publish(args) => cmd::publish::run(args, &config, retry, &progress),
        Command::Config => {
            cmd::print_table(
                "Setting",
                &[
                    ("SRU URL", config.sru.base_url.clone()),
                    ("Query", config.sru.query.clone()),
                    ("SRU version", config.sru.version.clone()),
                    ("Connection", config.sru.connection.clone()),
                    ("Output directory", config.sru.output_dir.display().to_string()),
                    ("Batch size", config.sru.batch_size.to_string()),
                    ("Sleep", format!("{}s", config.sru.sleep)),
                    (
                        "Harvest progress",
                        config.sru.progress_file.display().to_string(),
                    ),
                    (
                        "Repo ID",
                        config.hub.repo_id.clone().unwrap_or_else(|| "not set".into()),
                    ),
                    (
                        "Hub token",
                        if config.hub.token.is_some() {
                            "configured".into()
                        } else {
                            "not set".into()
                        },
                    ),
                    ("Data directory", config.hub.data_dir.display().to_string()),
                    ("Shard size", config.hub.shard_size.to_string()),
                    (
                        "Upload progress",
                        config.hub.progress_file.display().to_string(),
                    ),
                    ("Source label", config.hub.source_label.clone()),
                    ("Hub endpoint", config.hub.endpoint.clone()),
                    ("Max retries", retry.max_attempts.to_string()),
                    (
                        "Retry base",
                        format!("{:.1}s", retry.base_delay.as_secs_f64()),
                    ),
                    (
                        "Request timeout",
                        format!("{}s", config.http.request_timeout),
                    ),
                ],
            );
            Ok(())
        }
    }
}
