//! Publish loop: reconcile progress, then upload one shard per window

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use harvestline_core::{ProgressFile, fmt_num, retry_with_backoff};
use indicatif::ProgressBar;

use crate::config::Config;
use crate::hub::DatasetStore;
use crate::listing::{list_staged_files, resolve_data_dir};
use crate::partition::partition;
use crate::reconcile::{remote_high_water_mark, resume_index};
use crate::shard::build_shard;

/// Publish execution summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Index the run started from
    pub start_index: usize,
    /// Last committed index
    pub final_index: usize,
    /// Staged files found
    pub total_files: usize,
    pub shards_uploaded: usize,
    /// Progress file value at startup
    pub local_index: usize,
    /// High-water mark of the remote listing
    pub remote_index: usize,
    pub elapsed: Duration,
}

impl Summary {
    /// Every staged file is published
    pub fn is_complete(&self) -> bool {
        self.final_index >= self.total_files
    }
}

/// Publish every staged file not yet covered by a remote shard.
///
/// The progress file only moves after a shard upload succeeded, so a failed
/// run leaves every earlier shard committed and is resumed by the next run.
pub fn run(
    config: &Config,
    store: &impl DatasetStore,
    progress: &ProgressFile,
    pb: &ProgressBar,
) -> Result<Summary> {
    let start = Instant::now();

    if config.token().is_none() {
        bail!("No Hub token configured (set HF_TOKEN or pass --token)");
    }
    if !config.data_dir.is_dir() {
        bail!("Data directory {} does not exist", config.data_dir.display());
    }

    pb.set_message(format!("checking {}", config.repo_id));
    retry_with_backoff("create repo", &config.retry, || store.ensure_repo())
        .with_context(|| format!("Failed to create dataset {}", config.repo_id))?;

    let listing = retry_with_backoff("list files", &config.retry, || store.list_files())
        .with_context(|| format!("Failed to list files of {}", config.repo_id))?;
    let remote_index = remote_high_water_mark(&listing);
    let local_index = usize::try_from(progress.load()).unwrap_or(usize::MAX);
    let start_index = resume_index(local_index, remote_index, config.force_remote);

    if config.force_remote {
        log::info!("Ignoring local progress ({local_index}), remote is at {remote_index}");
    } else if local_index != remote_index {
        log::info!("Local progress {local_index}, remote {remote_index}, resuming at {start_index}");
    }

    let data_dir = resolve_data_dir(&config.data_dir)?;
    let files = list_staged_files(&data_dir)?;
    let total_files = files.len();

    let mut summary = Summary {
        start_index,
        final_index: start_index,
        total_files,
        shards_uploaded: 0,
        local_index,
        remote_index,
        elapsed: Duration::ZERO,
    };

    if start_index >= total_files {
        log::info!(
            "Nothing to do: {} files, all published (index {start_index})",
            fmt_num(total_files as u64)
        );
        summary.elapsed = start.elapsed();
        return Ok(summary);
    }

    log::info!(
        "Publishing {} files to {} in shards of {}, starting at {start_index}",
        fmt_num((total_files - start_index) as u64),
        config.repo_id,
        config.shard_size
    );
    pb.set_length(total_files as u64);
    pb.set_position(start_index as u64);

    for window in partition(&files, config.shard_size, start_index) {
        if config
            .max_shards
            .is_some_and(|max| summary.shards_uploaded >= max)
        {
            log::info!("Shard limit reached, stopping at index {}", summary.final_index);
            break;
        }

        let name = window.name();
        pb.set_message(name.clone());

        let shard = build_shard(window.files, &data_dir, &config.source_label)
            .with_context(|| format!("Failed to build {name}"))?;
        retry_with_backoff(&format!("upload {name}"), &config.retry, || {
            store.upload_file(shard.path(), &name)
        })
        .with_context(|| format!("Failed to upload {name}"))?;
        drop(shard);

        progress.save(window.end as u64).with_context(|| {
            format!("Failed to save progress to {}", progress.path().display())
        })?;
        summary.final_index = window.end;
        summary.shards_uploaded += 1;
        pb.set_position(window.end as u64);
        log::info!("Uploaded {name} ({} files)", window.files.len());
    }

    summary.elapsed = start.elapsed();

    log::info!("=== Publish Summary ===");
    log::info!(
        "Index: {} -> {} of {} ({} shards)",
        summary.start_index,
        summary.final_index,
        fmt_num(summary.total_files as u64),
        summary.shards_uploaded
    );
    log::info!("Time: {:.1}s", summary.elapsed.as_secs_f64());

    Ok(summary)
}
