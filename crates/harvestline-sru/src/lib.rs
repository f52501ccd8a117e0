//! Harvestline SRU - incremental harvester for SRU search services
//!
//! Pages through a `searchRetrieve` result set and stages every record as
//! `{identifier}.xml`, committing a persisted cursor after each page.
//!
//! # Example
//!
//! ```ignore
//! use harvestline_core::ProgressFile;
//! use harvestline_sru::{Config, SruClient, run};
//!
//! let config = Config::default();
//! let client = SruClient::new(&config.base_url);
//! let progress = ProgressFile::harvest(&config.progress_path);
//!
//! let summary = run(&config, &client, &progress, &indicatif::ProgressBar::hidden())?;
//! println!("cursor now at {}", summary.final_cursor);
//! ```

pub mod config;
pub mod materialize;
pub mod parser;
pub mod runner;
pub mod sru;

// Re-exports
pub use config::{Config, SruVersion};
pub use materialize::{HarvestedRecord, extract_identifier, materialize};
pub use parser::{RecordDocument, RecordElement, SearchResponse, parse_response};
pub use runner::{Summary, run};
pub use sru::{PageRequest, PageSource, SruClient};
