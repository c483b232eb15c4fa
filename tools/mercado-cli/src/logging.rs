//! Diagnostic logging for the CLI.
//!
//! Library crates emit `tracing` events; this installs the subscriber that
//! prints them to stderr so they never mix with command output on stdout.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "MERCADO_LOG";

const DEFAULT_FILTER: &str = "warn,mercado=info";
const VERBOSE_FILTER: &str = "info,mercado=debug";

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format (for terminals).
    #[default]
    Human,
    /// JSON format (for log aggregation).
    Json,
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(config: &LogConfig, verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback_directives(config, verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    let _ = match config.format {
        LogFormat::Human => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Directives used when neither environment variable is set.
fn fallback_directives(config: &LogConfig, verbose: bool) -> &str {
    if verbose {
        return VERBOSE_FILTER;
    }
    config.filter.as_deref().unwrap_or(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_directives() {
        let config = LogConfig::default();
        assert_eq!(fallback_directives(&config, false), DEFAULT_FILTER);
        assert_eq!(fallback_directives(&config, true), VERBOSE_FILTER);

        let config = LogConfig {
            filter: Some("debug".into()),
            ..LogConfig::default()
        };
        assert_eq!(fallback_directives(&config, false), "debug");
        assert_eq!(fallback_directives(&config, true), VERBOSE_FILTER);
    }

    #[test]
    fn test_log_format_names() {
        let format: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }
}
