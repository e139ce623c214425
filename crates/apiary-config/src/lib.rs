//! Typed deployment configuration for Apiary.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env), merged field by field
//!
//! # Overview
//!
//! [`ApiaryConfig`] has three sections:
//!
//! - [`DispatchConfig`] - Mount point, authenticator defaults and timeout, fault policy
//! - [`ContractConfig`] - REST inference and error collection during contract builds
//! - [`TelemetryConfigSection`] - Logging
//!
//! # Example
//!
//! ```no_run
//! use apiary_config::ConfigLoader;
//!
//! # fn main() -> Result<(), apiary_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("apiary.toml")?
//!     .with_env_prefix("APIARY")
//!     .load()?;
//!
//! println!("APIs are mounted under {}", config.dispatch.base_path);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [dispatch]
//! base_path = "/_api"
//! illegal_argument_status = "client_error"
//! auth_timeout_ms = 5000
//! default_authenticators = ["api_key"]
//! default_peer_authenticators = []
//!
//! [contract]
//! infer_rest_conventions = true
//! collect_all_errors = true
//!
//! [telemetry.logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY` variables:
//!
//! - `APIARY__DISPATCH__BASE_PATH=/api`
//! - `APIARY__DISPATCH__DEFAULT_AUTHENTICATORS=api_key,jwt`
//! - `APIARY__TELEMETRY__LOGGING__LEVEL=debug`

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiaryConfig::default();
        assert_eq!(config.dispatch.base_path, "/_api");
        assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_documented_file_format_parses() {
        let toml = r#"
            [dispatch]
            base_path = "/_api"
            illegal_argument_status = "client_error"
            auth_timeout_ms = 5000
            default_authenticators = ["api_key"]
            default_peer_authenticators = []

            [contract]
            infer_rest_conventions = true
            collect_all_errors = true

            [telemetry.logging]
            enabled = true
            level = "info"
            format = "json"
        "#;

        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.dispatch.default_authenticators, vec!["api_key"]);
    }
}
