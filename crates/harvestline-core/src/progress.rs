//! Terminal progress display.
//!
//! On a TTY each engine gets a spinner line and shard uploads a counting bar.
//! Otherwise every bar is hidden and the log carries the progress.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
        .expect("invalid template")
}

fn count_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:<10.cyan.bold} {bar:30.green/dim} {pos:>7}/{len:7} {eta:>4} {wide_msg:.dim}",
    )
    .expect("invalid template")
    .progress_chars("--")
}

/// Owns the `MultiProgress` that bars and the log bridge share.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Detects whether stderr is a terminal.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    pub fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    fn add(&self, pb: ProgressBar, style: ProgressStyle, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(pb);
        pb.set_style(style);
        pb.set_prefix(name.to_string());
        pb
    }

    /// Spinner status line; update with `set_message`.
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        let pb = self.add(ProgressBar::new(0), spinner_style(), name);
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Bar counting items from `position` up to `total`; both can be changed later.
    pub fn count_bar(&self, name: &str, position: u64, total: u64) -> ProgressBar {
        let pb = self.add(ProgressBar::new(total), count_style(), name);
        pb.set_position(position);
        pb
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// For the log bridge
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedProgress = Arc<ProgressContext>;

/// `1234567` -> `"1,234,567"`
pub fn fmt_num(n: u64) -> String {
    let digits = n.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
