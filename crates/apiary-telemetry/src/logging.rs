//! Structured logging for Apiary.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either
//! JSON or human-readable output. Contract builds and request dispatch emit
//! through the plain `tracing` macros; nothing here is needed to produce
//! events, only to print them.
//!
//! # Example
//!
//! ```rust,ignore
//! use apiary_telemetry::logging::{init_logging, LoggingConfig};
//!
//! init_logging(&LoggingConfig::development())?;
//! tracing::info!(method = "greetings.greeting.get", "dispatching");
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line, human-readable.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Whether logging is installed at all.
    pub enabled: bool,

    /// Filter directive (e.g. `info`, `apiary_runtime=debug,info`).
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Whether to include file and line info.
    pub include_location: bool,

    /// Whether to log span open and close events.
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
            span_events: false,
        }
    }
}

impl LoggingConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            span_events: true,
            ..Self::default()
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

/// Initializes the global subscriber.
///
/// Does nothing when logging is disabled.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for a bad `level` and
/// [`TelemetryError::LoggingInit`] if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(true);

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt_layer.json().with_filter(filter))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt_layer.pretty().with_filter(filter))
            .try_init(),
    };
    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Parses a filter directive.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the directive does not parse.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

/// Field names used by Apiary log events.
pub mod fields {
    /// Request id.
    pub const REQUEST_ID: &str = "request_id";
    /// Canonical method name.
    pub const METHOD: &str = "method";
    /// Request path.
    pub const PATH: &str = "path";
    /// Response status.
    pub const STATUS: &str = "status";
    /// Authenticated user, never a credential.
    pub const USER: &str = "user";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_development_config() {
        let config = LoggingConfig::development();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.include_location);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"level": "warn", "format": "pretty"}"#).unwrap();
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.enabled);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let parsed = serde_json::from_str::<LoggingConfig>(r#"{"colour": true}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("apiary_runtime=debug,warn").is_ok());
    }

    #[test]
    fn test_disabled_logging_is_a_no_op() {
        let config = LoggingConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
