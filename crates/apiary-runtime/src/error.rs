//! Registry errors.

use apiary_router::RouteError;
use thiserror::Error;

/// Failure to register or replace a service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// The contract has no methods for the class.
    #[error("contract {api}/{version} has no methods for service class '{service}'")]
    NoMethods {
        /// Service class.
        service: String,
        /// API name.
        api: String,
        /// API version.
        version: String,
    },

    /// A method has no bound invoker.
    #[error("method '{method}' has no invoker bound")]
    MissingInvoker {
        /// Canonical method name.
        method: String,
    },

    /// The class is already registered; use `replace`.
    #[error("service class '{service}' is already registered")]
    AlreadyRegistered {
        /// Service class.
        service: String,
    },

    /// The class is not registered.
    #[error("service class '{service}' is not registered")]
    NotRegistered {
        /// Service class.
        service: String,
    },

    /// The registration changed since it was read.
    #[error("registration of '{service}' changed concurrently; reload and retry")]
    Stale {
        /// Service class.
        service: String,
    },

    /// Two registered services serve the same canonical method.
    #[error("method '{method}' of {api}/{version} is served by both '{first}' and '{second}'")]
    DuplicateMethod {
        /// API name.
        api: String,
        /// API version.
        version: String,
        /// Canonical method name.
        method: String,
        /// Service class registered first.
        first: String,
        /// Service class registered second.
        second: String,
    },

    /// Two services of one API version disagree on API-level settings.
    #[error("service class '{service}' disagrees with other services of {api}/{version} on API settings")]
    InconsistentApi {
        /// Service class being registered.
        service: String,
        /// API name.
        api: String,
        /// API version.
        version: String,
    },

    /// The routing table rejected a method.
    #[error(transparent)]
    Route(#[from] RouteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_service() {
        let err = RegistryError::Stale {
            service: "GreetingService".to_string(),
        };
        assert!(err.to_string().contains("GreetingService"));

        let err = RegistryError::NoMethods {
            service: "Idle".to_string(),
            api: "greetings".to_string(),
            version: "v1".to_string(),
        };
        assert!(err.to_string().contains("greetings/v1"));
    }
}
