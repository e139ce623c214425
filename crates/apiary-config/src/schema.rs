//! Configuration section types.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use apiary_telemetry::{LogFormat, LoggingConfig};

/// How an illegal-argument failure raised by a service method is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllegalArgumentPolicy {
    /// The caller sent a bad argument: 400.
    #[default]
    ClientError,
    /// The service rejected its own input: 500.
    ServerError,
}

impl IllegalArgumentPolicy {
    /// Status reported for the failure.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::ClientError => StatusCode::BAD_REQUEST,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Request dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Path prefix every API is mounted under.
    pub base_path: String,

    /// Status for illegal-argument failures.
    pub illegal_argument_status: IllegalArgumentPolicy,

    /// Upper bound on one authenticator call, in milliseconds.
    pub auth_timeout_ms: u64,

    /// Authenticators used when a method configures none.
    pub default_authenticators: Vec<String>,

    /// Peer authenticators used when a method configures none.
    pub default_peer_authenticators: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_path: "/_api".to_string(),
            illegal_argument_status: IllegalArgumentPolicy::ClientError,
            auth_timeout_ms: 5000,
            default_authenticators: Vec::new(),
            default_peer_authenticators: Vec::new(),
        }
    }
}

impl DispatchConfig {
    /// Authenticator timeout as a [`Duration`].
    #[must_use]
    pub const fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }
}

/// Contract build settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractConfig {
    /// Infer missing paths and verbs from method names.
    pub infer_rest_conventions: bool,

    /// Keep assembling after the first failing class.
    pub collect_all_errors: bool,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            infer_rest_conventions: true,
            collect_all_errors: true,
        }
    }
}

/// Telemetry section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.base_path, "/_api");
        assert_eq!(config.auth_timeout(), Duration::from_secs(5));
        assert_eq!(config.illegal_argument_status.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_illegal_argument_policy_names() {
        let policy: IllegalArgumentPolicy = serde_json::from_str("\"server_error\"").unwrap();
        assert_eq!(policy, IllegalArgumentPolicy::ServerError);
        assert_eq!(policy.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_contract_defaults() {
        let config = ContractConfig::default();
        assert!(config.infer_rest_conventions);
        assert!(config.collect_all_errors);
    }

    #[test]
    fn test_sections_reject_unknown_fields() {
        assert!(serde_json::from_str::<DispatchConfig>(r#"{"port": 80}"#).is_err());
        assert!(serde_json::from_str::<ContractConfig>(r#"{"strict": true}"#).is_err());
    }
}
