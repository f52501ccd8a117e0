//! Harvest loop: request a page at the cursor, stage its records, commit the cursor

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use harvestline_core::{ProgressFile, fmt_num, retry_with_backoff};
use indicatif::ProgressBar;

use crate::config::Config;
use crate::materialize::{HarvestedRecord, materialize};
use crate::parser::parse_response;
use crate::sru::PageSource;

/// Harvest execution summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Cursor loaded at startup
    pub start_cursor: u64,
    /// Last committed cursor
    pub final_cursor: u64,
    pub pages: usize,
    pub records: u64,
    /// An empty page was seen (false when `max_pages` stopped the run)
    pub reached_end: bool,
    pub elapsed: Duration,
}

/// Run the harvest until the server returns an empty page.
///
/// Every record of a page is on disk before the cursor moves past it, so a
/// run killed at any point resumes from the last fully staged page.
pub fn run(
    config: &Config,
    source: &impl PageSource,
    progress: &ProgressFile,
    pb: &ProgressBar,
) -> Result<Summary> {
    let start = Instant::now();

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    let start_cursor = progress.load();
    let mut cursor = start_cursor;
    let mut pages = 0usize;
    let mut records = 0u64;
    let mut reached_end = false;

    log::info!(
        "Harvesting {} (query {:?}, SRU {}) from record {cursor}",
        config.base_url,
        config.query,
        config.version
    );

    loop {
        if config.max_pages.is_some_and(|max| pages >= max) {
            log::info!("Page limit reached, stopping at start={cursor}");
            break;
        }

        pb.set_message(format!("requesting start={cursor}"));
        let request = config.page_request(cursor);
        let body = retry_with_backoff(&format!("page start={cursor}"), &config.retry, || {
            source.fetch_page(&request)
        })
        .with_context(|| format!("Failed to fetch page at start={cursor}"))?;

        let response = parse_response(&body)
            .with_context(|| format!("Invalid SRU response at start={cursor}"))?;

        if response.records.is_empty() {
            for diagnostic in &response.diagnostics {
                log::warn!("SRU diagnostic at start={cursor}: {diagnostic}");
            }
            log::info!("No more records at start={cursor}, harvest complete");
            reached_end = true;
            break;
        }

        let count = response.records.len() as u64;
        for (i, doc) in response.records.into_iter().enumerate() {
            let record = HarvestedRecord::from_document(doc, cursor + i as u64);
            materialize(&record, &config.output_dir).with_context(|| {
                format!(
                    "Failed to write record {} (page start={cursor})",
                    record.identifier
                )
            })?;
        }

        cursor += count;
        progress
            .save(cursor)
            .with_context(|| format!("Failed to save cursor to {}", progress.path().display()))?;
        pages += 1;
        records += count;

        match response.number_of_records {
            Some(total) => log::info!(
                "Saved {count} records, next start={cursor} of {}",
                fmt_num(total)
            ),
            None => log::info!("Saved {count} records, next start={cursor}"),
        }
        pb.set_message(format!("{} records staged", fmt_num(records)));

        std::thread::sleep(config.polite_delay);
    }

    let summary = Summary {
        start_cursor,
        final_cursor: cursor,
        pages,
        records,
        reached_end,
        elapsed: start.elapsed(),
    };

    log::info!("=== Harvest Summary ===");
    log::info!(
        "Cursor: {} -> {} ({} pages, {} records)",
        summary.start_cursor,
        summary.final_cursor,
        summary.pages,
        fmt_num(summary.records)
    );
    log::info!("Time: {:.1}s", summary.elapsed.as_secs_f64());

    Ok(summary)
}
