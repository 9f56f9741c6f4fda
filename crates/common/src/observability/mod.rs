//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! embedding application's job. [`init_tracing`] is the convenience entry
//! point used by hosts and by integration tests that want log output.
//!
//! `RUST_LOG` takes precedence over the filter passed in, so verbosity can
//! be raised without a rebuild.

use tracing_subscriber::EnvFilter;

/// Output format for the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse a format name (`compact` or `json`), case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Build the filter from `RUST_LOG`, falling back to `default_filter`
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a global subscriber
///
/// Returns `false` if a global subscriber was already installed; the call
/// is then a no-op, so repeated initialization (e.g. across tests) is safe.
pub fn init_tracing(default_filter: &str, format: LogFormat) -> bool {
    let filter = env_filter(default_filter);
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = match format {
        LogFormat::Compact => builder.compact().try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::debug!(?format, "Tracing subscriber installed");
    }
    installed
}
