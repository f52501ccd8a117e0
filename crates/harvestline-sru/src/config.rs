//! Harvest configuration

use std::path::PathBuf;
use std::time::Duration;

use harvestline_core::RetryPolicy;

use crate::sru::PageRequest;

/// SRU protocol version sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SruVersion {
    #[default]
    V1_2,
    V2_0,
}

impl SruVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_2 => "1.2",
            Self::V2_0 => "2.0",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "1.2" => Some(Self::V1_2),
            "2.0" => Some(Self::V2_0),
            _ => None,
        }
    }
}

impl std::fmt::Display for SruVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime configuration for one harvest run
#[derive(Debug, Clone)]
pub struct Config {
    /// SRU endpoint
    pub base_url: String,
    /// CQL query
    pub query: String,
    pub version: SruVersion,
    /// Value of the `x-connection` parameter (collection name)
    pub connection: String,
    /// Directory receiving one `.xml` file per record
    pub output_dir: PathBuf,
    /// `maximumRecords` per request
    pub page_size: u32,
    /// Pause between two page requests
    pub polite_delay: Duration,
    /// Cursor file (`{"start": n}`)
    pub progress_path: PathBuf,
    /// Stop after this many pages (cursor stays committed)
    pub max_pages: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://zoekservice.overheid.nl/sru/Search".to_string(),
            query: "modified<=2025-02-13".to_string(),
            version: SruVersion::default(),
            connection: "BWB".to_string(),
            output_dir: PathBuf::from("data"),
            page_size: 100,
            polite_delay: Duration::from_secs(3),
            progress_path: PathBuf::from("sru_progress.json"),
            max_pages: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Request for the page starting at `cursor`
    pub fn page_request(&self, cursor: u64) -> PageRequest<'_> {
        PageRequest {
            version: self.version.as_str(),
            connection: &self.connection,
            query: &self.query,
            start_record: cursor,
            maximum_records: self.page_size,
        }
    }
}
