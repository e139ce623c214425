//! Observability for Apiary.
//!
//! - [`logging`]: installs a `tracing-subscriber` registry (JSON or pretty)
//! - [`metrics`]: dispatch counters and histograms through the `metrics` facade
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `apiary_dispatch_total` | Counter | `method`, `status` |
//! | `apiary_dispatch_duration_seconds` | Histogram | `method` |
//! | `apiary_auth_rejections_total` | Counter | `reason` |
//! | `apiary_registry_swaps_total` | Counter | `outcome` |
//!
//! # Example
//!
//! ```rust,ignore
//! use apiary_telemetry::{init_telemetry, LoggingConfig};
//!
//! init_telemetry(&LoggingConfig::production())?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogFormat, LoggingConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs logging and registers metric descriptions.
///
/// # Errors
///
/// Returns `TelemetryError` if logging cannot be initialized.
pub fn init_telemetry(logging: &LoggingConfig) -> TelemetryResult<()> {
    init_logging(logging)?;
    metrics::describe_metrics();
    Ok(())
}
