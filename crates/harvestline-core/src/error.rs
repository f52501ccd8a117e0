//! Error type shared by every external call that goes through the retry loop

/// Failure of one external call (page fetch, listing, upload).
///
/// The variant decides whether [`retry_with_backoff`](crate::retry::retry_with_backoff)
/// tries again or hands the error back to the engine.
#[derive(Debug)]
pub enum PipelineError {
    /// Connection failure, timeout or non-success HTTP status
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Local or socket I/O error
    Io(std::io::Error),
    /// Response body that could not be understood
    Parse(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl PipelineError {
    /// Create HTTP error from reqwest error.
    ///
    /// The URL is stripped so tokens in query strings never reach the logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        }
    }

    /// Transport failures and HTTP error statuses are retried; malformed
    /// responses and local disk errors are not.
    pub fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            Self::Http { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                ErrorKind::TimedOut
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::Interrupted
            ),
            Self::Parse(_) => false,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
