//! Harvestline Core - shared infrastructure for the harvest and publish engines
//!
//! Persisted progress cursors, the retry loop used around every external call,
//! the shared HTTP client, logging and progress display.

pub mod cursor;
pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;

// Re-exports for convenience
pub use cursor::ProgressFile;
pub use error::PipelineError;
pub use http::{HttpConfig, SHARED_RUNTIME, block_on, http_client, http_config, set_http_config};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{RetryPolicy, retry_with_backoff, retry_with_sleep};
