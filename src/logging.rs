//! Tracing subscriber setup

use std::io;

use clap::ValueEnum;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Installs the global tracing subscriber, writing to stdout.
///
/// Respects `RUST_LOG` if set. Calling this more than once is harmless; later
/// calls leave the first subscriber in place.
pub fn init(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = fmt().with_env_filter(env_filter).with_writer(io::stdout);
    let _ = match format {
        LogFormat::Pretty => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
