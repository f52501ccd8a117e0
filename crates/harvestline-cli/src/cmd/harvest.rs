//! Harvest subcommand - stage SRU records as XML files

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, ValueEnum};
use harvestline_core::{ProgressFile, RetryPolicy, SharedProgress, fmt_num};
use harvestline_sru::{SruClient, SruVersion};

use crate::config::{Config, secs};

#[derive(Args, Debug)]
pub struct HarvestArgs {
    /// SRU endpoint
    #[arg(long, env = "SRU_URL")]
    pub sru_url: Option<String>,

    /// CQL query
    #[arg(short, long, env = "CQL_QUERY")]
    pub query: Option<String>,

    /// SRU protocol version
    #[arg(long, value_enum)]
    pub sru_version: Option<SruVersionArg>,

    /// Collection name sent as `x-connection`
    #[arg(long)]
    pub connection: Option<String>,

    /// Output directory for record files
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Records per request
    #[arg(short, long)]
    pub batch_size: Option<u32>,

    /// Seconds to wait between requests
    #[arg(long)]
    pub sleep: Option<f64>,

    /// Cursor file
    #[arg(long)]
    pub progress_file: Option<PathBuf>,

    /// Stop after this many pages
    #[arg(short = 'l', long)]
    pub max_pages: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum SruVersionArg {
    #[value(name = "1.2")]
    V1_2,
    #[value(name = "2.0")]
    V2_0,
}

impl From<SruVersionArg> for SruVersion {
    fn from(v: SruVersionArg) -> Self {
        match v {
            SruVersionArg::V1_2 => SruVersion::V1_2,
            SruVersionArg::V2_0 => SruVersion::V2_0,
        }
    }
}

/// Merge CLI flags over the config file
fn harvest_config(
    args: HarvestArgs,
    config: &Config,
    retry: RetryPolicy,
) -> Result<harvestline_sru::Config> {
    let version = match args.sru_version {
        Some(v) => v.into(),
        None => SruVersion::from_name(&config.sru.version).ok_or_else(|| {
            anyhow!(
                "Unsupported SRU version {:?} in config (expected 1.2 or 2.0)",
                config.sru.version
            )
        })?,
    };
    let page_size = args.batch_size.unwrap_or(config.sru.batch_size);
    if page_size == 0 {
        anyhow::bail!("Batch size must be at least 1");
    }

    Ok(harvestline_sru::Config {
        base_url: args.sru_url.unwrap_or_else(|| config.sru.base_url.clone()),
        query: args.query.unwrap_or_else(|| config.sru.query.clone()),
        version,
        connection: args
            .connection
            .unwrap_or_else(|| config.sru.connection.clone()),
        output_dir: args
            .out_dir
            .unwrap_or_else(|| config.sru.output_dir.clone()),
        page_size,
        polite_delay: secs(args.sleep.unwrap_or(config.sru.sleep)),
        progress_path: args
            .progress_file
            .unwrap_or_else(|| config.sru.progress_file.clone()),
        max_pages: args.max_pages,
        retry,
    })
}

pub fn run(
    args: HarvestArgs,
    config: &Config,
    retry: RetryPolicy,
    progress: &SharedProgress,
) -> Result<()> {
    let sru_config = harvest_config(args, config, retry)?;
    let client = SruClient::new(&sru_config.base_url);
    let cursor = ProgressFile::harvest(&sru_config.progress_path);

    log::info!("Harvesting SRU records");
    log::info!("  Endpoint: {}", sru_config.base_url);
    log::info!("  Output: {}", sru_config.output_dir.display());
    log::info!("  Progress: {}", sru_config.progress_path.display());

    let pb = progress.stage_line("harvest");
    let result = harvestline_sru::run(&sru_config, &client, &cursor, &pb);
    pb.finish_and_clear();
    let summary = result?;

    super::print_table(
        "Harvest",
        &[
            (
                "Cursor",
                format!("{} -> {}", summary.start_cursor, summary.final_cursor),
            ),
            ("Pages", summary.pages.to_string()),
            ("Records", fmt_num(summary.records)),
            (
                "Status",
                if summary.reached_end {
                    "complete".into()
                } else {
                    "page limit reached".into()
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
    use std::time::Duration;

    fn empty_args() -> HarvestArgs {
        HarvestArgs {
            sru_url: None,
            query: None,
            sru_version: None,
            connection: None,
            out_dir: None,
            batch_size: None,
            sleep: None,
            progress_file: None,
            max_pages: None,
        }
    }

    #[test]
    fn config_file_values_used_without_flags() {
        let mut config = Config::default();
        config.sru.version = "2.0".into();
        config.sru.sleep = 0.25;

        let sru = harvest_config(empty_args(), &config, RetryPolicy::default()).unwrap();
        assert_eq!(sru.version, SruVersion::V2_0);
        assert_eq!(sru.polite_delay, Duration::from_millis(250));
        assert_eq!(sru.page_size, 100);
    }

    #[test]
    fn flags_override_config() {
        let args = HarvestArgs {
            query: Some("dcterms.identifier=BWBR0001840".into()),
            sru_version: Some(SruVersionArg::V1_2),
            batch_size: Some(10),
            max_pages: Some(2),
            ..empty_args()
        };
        let mut config = Config::default();
        config.sru.version = "2.0".into();

        let sru = harvest_config(args, &config, RetryPolicy::default()).unwrap();
        assert_eq!(sru.query, "dcterms.identifier=BWBR0001840");
        assert_eq!(sru.version, SruVersion::V1_2);
        assert_eq!(sru.page_size, 10);
        assert_eq!(sru.max_pages, Some(2));
    }

    #[test]
    fn bad_version_in_config_is_error() {
        let mut config = Config::default();
        config.sru.version = "1.1".into();
        assert!(harvest_config(empty_args(), &config, RetryPolicy::default()).is_err());
    }

    #[test]
    fn zero_batch_size_is_error() {
        let args = HarvestArgs {
            batch_size: Some(0),
            ..empty_args()
        };
        assert!(harvest_config(args, &Config::default(), RetryPolicy::default()).is_err());
    }
}
