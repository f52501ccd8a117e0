//! Logging setup: env_logger, routed through indicatif when bars are on screen

use std::io::Write;

use indicatif::MultiProgress;
use log::Level;

const RESET: &str = "\x1b[0m";

/// `[LEVEL]` tag, padded to five characters, optionally colored.
fn level_tag(level: Level, color: bool) -> String {
    let (name, ansi) = match level {
        Level::Error => ("ERROR", "\x1b[31m"),
        Level::Warn => ("WARN", "\x1b[33m"),
        Level::Info => ("INFO", "\x1b[32m"),
        Level::Debug => ("DEBUG", "\x1b[36m"),
        Level::Trace => ("TRACE", "\x1b[35m"),
    };
    if color {
        format!("[{ansi}{name:<5}{RESET}]")
    } else {
        format!("[{name:<5}]")
    }
}

/// Logger that prints above the spinners so lines and bars don't interleave.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        let tag = level_tag(record.level(), true);
        let line = if record.level() >= Level::Debug {
            format!("{tag} {}: {}", record.target(), record.args())
        } else {
            format!("{tag} {}", record.args())
        };
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Our crates at `level`, dependencies at warn.
fn default_filter(level: &str) -> String {
    let mut directives: Vec<String> = [
        "harvestline",
        "harvestline_core",
        "harvestline_sru",
        "harvestline_hub",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect();
    directives.push("warn".to_string());
    directives.join(",")
}

/// Install the global logger. `RUST_LOG` overrides the level picked from the flags.
///
/// With a `MultiProgress` (TTY mode) log lines are printed above the bars;
/// without one they go to stderr uncolored, prefixed with a timestamp.
/// Calling this twice keeps the first logger.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    let level = match (debug, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    };
    let env = env_logger::Env::default().default_filter_or(default_filter(level));
    let mut builder = env_logger::Builder::from_env(env);

    match multi {
        Some(multi) => {
            let logger = builder.build();
            let max_level = logger.filter();
            let bridged = IndicatifLogger::new(logger, multi.clone());
            if log::set_boxed_logger(Box::new(bridged)).is_ok() {
                log::set_max_level(max_level);
            }
        }
        None => {
            let _ = builder
                .format(|buf, record| {
                    writeln!(
                        buf,
                        "{} {} {}",
                        buf.timestamp_seconds(),
                        level_tag(record.level(), false),
                        record.args()
                    )
                })
                .try_init();
        }
    }
}
