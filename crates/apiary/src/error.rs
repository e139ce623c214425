//! Bootstrap errors.

use apiary_config::ConfigError;
use apiary_core::ContractErrors;
use apiary_runtime::RegistryError;
use apiary_telemetry::TelemetryError;
use thiserror::Error;

/// Failure to start or reload an [`Apiary`](crate::Apiary).
#[derive(Error, Debug)]
pub enum ApiaryError {
    /// Configuration did not load or validate.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// One or more contracts failed to build.
    #[error(transparent)]
    Contract(#[from] ContractErrors),

    /// A service could not be registered.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The contract build produced no contract for a service.
    #[error("no contract serves service class '{service}'")]
    NoContract {
        /// Service class.
        service: String,
    },
}

/// Result type for bootstrap operations.
pub type ApiaryResult<T> = Result<T, ApiaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_contract_message() {
        let err = ApiaryError::NoContract {
            service: "GreetingService".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no contract serves service class 'GreetingService'"
        );
    }

    #[test]
    fn test_registry_error_converts() {
        let err: ApiaryError = RegistryError::NotRegistered {
            service: "X".to_string(),
        }
        .into();
        assert!(matches!(err, ApiaryError::Registry(_)));
    }
}
