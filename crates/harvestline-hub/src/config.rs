//! Publish configuration

use std::num::NonZeroUsize;
use std::path::PathBuf;

use harvestline_core::RetryPolicy;

use crate::hub::DEFAULT_ENDPOINT;

/// Runtime configuration for one publish run
#[derive(Debug, Clone)]
pub struct Config {
    /// Target dataset, `namespace/name`
    pub repo_id: String,
    /// Access token; the run refuses to start without one
    pub token: Option<String>,
    /// Staging directory written by the harvester
    pub data_dir: PathBuf,
    /// Files per shard
    pub shard_size: NonZeroUsize,
    /// Trust remote progress only, ignoring the local progress file
    pub force_remote: bool,
    /// Local progress file (`{"last_index": n}`)
    pub progress_path: PathBuf,
    /// Value of the `source` field on every shard line
    pub source_label: String,
    pub endpoint: String,
    pub revision: String,
    /// Stop after uploading this many shards
    pub max_shards: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_id: String::new(),
            token: None,
            data_dir: PathBuf::from("data"),
            shard_size: NonZeroUsize::new(500).unwrap_or(NonZeroUsize::MIN),
            force_remote: false,
            progress_path: PathBuf::from("upload_progress.json"),
            source_label: "Basis Wettenbestand".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            revision: "main".to_string(),
            max_shards: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Token, if one is set and non-blank
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}
