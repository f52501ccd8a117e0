//! Publish subcommand - upload staged records as JSONL shards

use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use harvestline_core::{ProgressFile, RetryPolicy, SharedProgress, fmt_num};
use harvestline_hub::HubClient;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Target dataset (`namespace/name`)
    #[arg(short, long)]
    pub repo_id: Option<String>,

    /// Hugging Face access token
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory holding the staged record files
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Files per shard
    #[arg(short, long)]
    pub shard_size: Option<NonZeroUsize>,

    /// Resume from the remote shards only, ignoring local progress
    #[arg(long)]
    pub force_remote: bool,

    /// Local progress file
    #[arg(long)]
    pub progress_file: Option<PathBuf>,

    /// Value of the `source` field on every record
    #[arg(long)]
    pub source_label: Option<String>,

    /// Stop after uploading this many shards
    #[arg(short = 'l', long)]
    pub max_shards: Option<usize>,
}

/// Merge CLI flags over the config file
fn publish_config(
    args: PublishArgs,
    config: &Config,
    retry: RetryPolicy,
) -> Result<harvestline_hub::Config> {
    let repo_id = args
        .repo_id
        .or_else(|| config.hub.repo_id.clone())
        .context("No dataset repository given (--repo-id or [hub] repo_id)")?;
    let shard_size = match args.shard_size {
        Some(n) => n,
        None => NonZeroUsize::new(config.hub.shard_size)
            .context("shard_size in config must be at least 1")?,
    };

    Ok(harvestline_hub::Config {
        repo_id,
        token: args.token.or_else(|| config.hub.token.clone()),
        data_dir: args.data_dir.unwrap_or_else(|| config.hub.data_dir.clone()),
        shard_size,
        force_remote: args.force_remote,
        progress_path: args
            .progress_file
            .unwrap_or_else(|| config.hub.progress_file.clone()),
        source_label: args
            .source_label
            .unwrap_or_else(|| config.hub.source_label.clone()),
        endpoint: config.hub.endpoint.clone(),
        revision: config.hub.revision.clone(),
        max_shards: args.max_shards,
        retry,
    })
}

pub fn run(
    args: PublishArgs,
    config: &Config,
    retry: RetryPolicy,
    progress: &SharedProgress,
) -> Result<()> {
    let hub_config = publish_config(args, config, retry)?;
    let client = HubClient::new(
        &hub_config.endpoint,
        &hub_config.repo_id,
        hub_config.token().unwrap_or_default(),
    )
    .with_revision(&hub_config.revision);
    let cursor = ProgressFile::upload(&hub_config.progress_path);

    log::info!("Publishing to {}", hub_config.repo_id);
    log::info!("  Data: {}", hub_config.data_dir.display());
    log::info!("  Progress: {}", hub_config.progress_path.display());

    let pb = progress.count_bar("publish", 0, 0);
    let result = harvestline_hub::run(&hub_config, &client, &cursor, &pb);
    pb.finish_and_clear();
    let summary = result?;

    super::print_table(
        "Publish",
        &[
            (
                "Progress",
                format!(
                    "local {}, remote {}",
                    summary.local_index, summary.remote_index
                ),
            ),
            (
                "Index",
                format!(
                    "{} -> {} of {}",
                    summary.start_index,
                    summary.final_index,
                    fmt_num(summary.total_files as u64)
                ),
            ),
            ("Shards", summary.shards_uploaded.to_string()),
            (
                "Status",
                if summary.is_complete() {
                    "complete".into()
                } else {
                    "shard limit reached".into()
                },
            ),
            ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
        ],
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(repo_id: Option<&str>) -> PublishArgs {
        PublishArgs {
            repo_id: repo_id.map(String::from),
            token: None,
            data_dir: None,
            shard_size: None,
            force_remote: false,
            progress_file: None,
            source_label: None,
            max_shards: None,
        }
    }

    #[test]
    fn repo_id_required() {
        let err = publish_config(args(None), &Config::default(), RetryPolicy::default())
            .unwrap_err();
        assert!(err.to_string().contains("--repo-id"));
    }

    #[test]
    fn config_file_values_used_without_flags() {
        let mut config = Config::default();
        config.hub.repo_id = Some("org/wetten".into());
        config.hub.token = Some("hf_file".into());
        config.hub.shard_size = 250;

        let hub = publish_config(args(None), &config, RetryPolicy::default()).unwrap();
        assert_eq!(hub.repo_id, "org/wetten");
        assert_eq!(hub.token(), Some("hf_file"));
        assert_eq!(hub.shard_size.get(), 250);
        assert_eq!(hub.source_label, "Basis Wettenbestand");
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.hub.repo_id = Some("org/old".into());
        let cli = PublishArgs {
            token: Some("hf_cli".into()),
            shard_size: NonZeroUsize::new(10),
            force_remote: true,
            ..args(Some("org/new"))
        };

        let hub = publish_config(cli, &config, RetryPolicy::default()).unwrap();
        assert_eq!(hub.repo_id, "org/new");
        assert_eq!(hub.token(), Some("hf_cli"));
        assert_eq!(hub.shard_size.get(), 10);
        assert!(hub.force_remote);
    }

    #[test]
    fn zero_shard_size_in_config_is_error() {
        let mut config = Config::default();
        config.hub.shard_size = 0;
        assert!(publish_config(args(Some("org/x")), &config, RetryPolicy::default()).is_err());
    }
}
