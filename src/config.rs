//! Runtime configuration assembled from command-line flags and environment

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::cache::SnapshotStore;
use crate::cli::Cli;
use crate::logging::LogFormat;
use crate::refresh::RefreshConfig;
use crate::upstream::profile::{DEFAULT_PROFILE_URL, DEFAULT_TIMEOUT};

/// Store directory used when no platform data directory is available
const FALLBACK_STATS_DIR: &str = "stats";

/// Errors for configuration values that parse but make no sense
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bind address {0}")]
    InvalidAddress(String),

    #[error("invalid allowed origin {0:?}")]
    InvalidOrigin(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Browser origins allowed by the CORS layer
    pub allowed_origins: Vec<HeaderValue>,
    /// Static files served for unmatched paths
    pub public_dir: PathBuf,
}

/// Snapshot store settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

/// Upstream profile API settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROFILE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub upstream: UpstreamConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Builds the configuration from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(AppConfig)` with defaults filled in
    /// * `Err(ConfigError)` if an address, origin or count is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let addr = format!("{}:{}", cli.host, cli.port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", cli.host, cli.port)))?;

        let allowed_origins = cli
            .allowed_origins
            .iter()
            .map(|origin| {
                let origin = origin.trim();
                // The CORS layer only takes an explicit origin list.
                if origin == "*" {
                    return Err(ConfigError::InvalidOrigin(origin.to_string()));
                }
                HeaderValue::from_str(origin).map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if cli.upstream_timeout_secs == 0 {
            return Err(ConfigError::Zero("upstream timeout"));
        }
        if cli.refresh_interval_secs == 0 {
            return Err(ConfigError::Zero("refresh interval"));
        }
        if cli.refresh_concurrency == 0 {
            return Err(ConfigError::Zero("refresh concurrency"));
        }

        let stats_dir = match &cli.stats_dir {
            Some(dir) => dir.clone(),
            None => SnapshotStore::new()
                .map(|store| store.dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(FALLBACK_STATS_DIR)),
        };

        Ok(Self {
            server: ServerConfig {
                addr,
                allowed_origins,
                public_dir: cli.public_dir.clone(),
            },
            store: StoreConfig { dir: stats_dir },
            upstream: UpstreamConfig {
                base_url: cli
                    .upstream_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROFILE_URL.to_string()),
                timeout: Duration::from_secs(cli.upstream_timeout_secs),
            },
            refresh: RefreshConfig {
                interval: Duration::from_secs(cli.refresh_interval_secs),
                concurrency: cli.refresh_concurrency,
                enabled: !cli.no_refresh,
            },
            logging: LoggingConfig {
                format: cli.log_format,
            },
        })
    }
}
