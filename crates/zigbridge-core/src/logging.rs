//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;

use crate::config::env_vars;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human-readable lines
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// JSON when `ZIGBRIDGE_LOG_JSON=true`, compact otherwise.
    pub fn from_env() -> Self {
        let json = std::env::var(env_vars::LOG_JSON)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);
        if json {
            Self::Json
        } else {
            Self::Compact
        }
    }
}

/// Build the filter from `RUST_LOG`, falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(format: LogFormat, verbose: bool) {
    let default_directive = if verbose { "zigbridge=debug" } else { "zigbridge=info" };
    let filter = env_filter(default_directive);

    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
