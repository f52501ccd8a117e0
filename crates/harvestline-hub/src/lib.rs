//! Harvestline Hub - publish staged records as JSON-lines shards
//!
//! Groups the staged `*.xml` files into fixed-size windows, uploads each window
//! as `shards/shard_{start}_{end}.jsonl` to a Hugging Face dataset repository,
//! and resumes from whichever is further ahead: the local progress file or the
//! shards already present remotely.
//!
//! # Example
//!
//! ```ignore
//! use harvestline_core::ProgressFile;
//! use harvestline_hub::{Config, HubClient, run};
//!
//! let config = Config {
//!     repo_id: "org/wetten".into(),
//!     token: std::env::var("HF_TOKEN").ok(),
//!     ..Default::default()
//! };
//! let client = HubClient::new(&config.endpoint, &config.repo_id, config.token().unwrap_or(""));
//! let progress = ProgressFile::upload(&config.progress_path);
//!
//! let summary = run(&config, &client, &progress, &indicatif::ProgressBar::hidden())?;
//! ```

pub mod config;
pub mod hub;
pub mod listing;
pub mod partition;
pub mod reconcile;
pub mod runner;
pub mod shard;

// Re-exports
pub use config::Config;
pub use hub::{DEFAULT_ENDPOINT, DatasetStore, HubClient, UploadMode};
pub use listing::{list_staged_files, relative_url, resolve_data_dir};
pub use partition::{ShardWindow, partition, shard_name};
pub use reconcile::{parse_shard_name, remote_high_water_mark, resume_index};
pub use runner::{Summary, run};
pub use shard::{ShardRecord, build_shard};
