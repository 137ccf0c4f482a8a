//! Command-line interface parsing for statkeeper
//!
//! Every flag can also be supplied through a `STATKEEPER_*` environment
//! variable. Validation and defaulting happen in `config::AppConfig::from_cli`.

use std::path::PathBuf;

use clap::Parser;

use crate::logging::LogFormat;

/// Statkeeper - cache player profile statistics and keep them fresh
#[derive(Parser, Debug, Clone)]
#[command(name = "statkeeper")]
#[command(about = "Serve cached player profile statistics and refresh them in the background")]
#[command(version)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "STATKEEPER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "STATKEEPER_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding one `<username>.json` snapshot per user
    ///
    /// Defaults to the platform data directory, or `./stats` if none exists.
    #[arg(long, env = "STATKEEPER_STATS_DIR", value_name = "DIR")]
    pub stats_dir: Option<PathBuf>,

    /// Directory of static files served for unmatched paths
    #[arg(long, env = "STATKEEPER_PUBLIC_DIR", value_name = "DIR", default_value = "public")]
    pub public_dir: PathBuf,

    /// Profile-get endpoint of the upstream API
    #[arg(long, env = "STATKEEPER_UPSTREAM_URL", value_name = "URL")]
    pub upstream_url: Option<String>,

    /// Timeout for a single upstream request, in seconds
    #[arg(long, env = "STATKEEPER_UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Seconds between background refreshes of every stored snapshot
    #[arg(long, env = "STATKEEPER_REFRESH_INTERVAL_SECS", default_value_t = 180)]
    pub refresh_interval_secs: u64,

    /// How many snapshots a refresh tick fetches at once
    #[arg(long, env = "STATKEEPER_REFRESH_CONCURRENCY", default_value_t = 4)]
    pub refresh_concurrency: usize,

    /// Disable the background refresher
    #[arg(long, env = "STATKEEPER_NO_REFRESH")]
    pub no_refresh: bool,

    /// Origin allowed to call the API from a browser (repeatable)
    ///
    /// Examples:
    ///   statkeeper --allowed-origin http://localhost:3000
    ///   statkeeper --allowed-origin http://a.example --allowed-origin http://b.example
    #[arg(
        long = "allowed-origin",
        env = "STATKEEPER_ALLOWED_ORIGINS",
        value_name = "ORIGIN",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Log output format
    #[arg(long, env = "STATKEEPER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["statkeeper"]).unwrap();
        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 5000);
        assert_eq!(cli.refresh_interval_secs, 180);
        assert_eq!(cli.refresh_concurrency, 4);
        assert!(!cli.no_refresh);
        assert!(cli.stats_dir.is_none());
        assert_eq!(cli.allowed_origins, vec!["http://localhost:3000".to_string()]);
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_repeated_origins() {
        let cli = Cli::try_parse_from([
            "statkeeper",
            "--allowed-origin",
            "http://a.example",
            "--allowed-origin",
            "http://b.example",
        ])
        .unwrap();
        assert_eq!(cli.allowed_origins, vec!["http://a.example", "http://b.example"]);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "statkeeper",
            "--port",
            "8080",
            "--stats-dir",
            "/tmp/stats",
            "--refresh-interval-secs",
            "30",
            "--no-refresh",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.stats_dir, Some(PathBuf::from("/tmp/stats")));
        assert_eq!(cli.refresh_interval_secs, 30);
        assert!(cli.no_refresh);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["statkeeper", "--port", "not-a-port"]).is_err());
    }
}
