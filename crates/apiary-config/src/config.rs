//! Main configuration types.
//!
//! This module provides the top-level [`ApiaryConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ContractConfig, DispatchConfig, LogFormat, TelemetryConfigSection};

/// Complete Apiary deployment configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use apiary_config::ApiaryConfig;
///
/// let config = ApiaryConfig::default();
/// assert_eq!(config.dispatch.base_path, "/_api");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ApiaryConfig {
    /// Request dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Contract build settings.
    #[serde(default)]
    pub contract: ContractConfig,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl ApiaryConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use apiary_config::{ApiaryConfig, DispatchConfig};
    ///
    /// let config = ApiaryConfig::builder()
    ///     .dispatch(DispatchConfig {
    ///         base_path: "/api".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert_eq!(config.dispatch.base_path, "/api");
    /// ```
    #[must_use]
    pub fn builder() -> ApiaryConfigBuilder {
        ApiaryConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `dispatch.base_path` does not start with `/` or contains a placeholder
    /// - `dispatch.auth_timeout_ms` is zero
    /// - `telemetry.logging.level` is not a valid filter while logging is enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.dispatch.base_path;
        if !base.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "dispatch.base_path",
                format!("must start with '/': {base}"),
            ));
        }
        if base.contains('{') || base.contains('}') {
            return Err(ConfigError::invalid_value(
                "dispatch.base_path",
                "must not contain placeholders",
            ));
        }

        if self.dispatch.auth_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "dispatch.auth_timeout_ms",
                "must be greater than zero",
            ));
        }

        let logging = &self.telemetry.logging;
        if logging.enabled {
            apiary_telemetry::create_env_filter(&logging.level)
                .map_err(|e| ConfigError::invalid_value("telemetry.logging.level", e.to_string()))?;
        }

        Ok(())
    }

    /// Development preset: pretty debug logs, illegal arguments blamed on
    /// the server so they surface during testing.
    ///
    /// ```
    /// use apiary_config::ApiaryConfig;
    ///
    /// let config = ApiaryConfig::development();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging = apiary_telemetry::LoggingConfig::development();
        config.dispatch.illegal_argument_status = crate::IllegalArgumentPolicy::ServerError;
        config
    }

    /// Production preset: JSON info logs, inference disabled so every
    /// method states its path and verb.
    ///
    /// ```
    /// use apiary_config::{ApiaryConfig, LogFormat};
    ///
    /// let config = ApiaryConfig::production();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    /// assert!(!config.contract.infer_rest_conventions);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.contract.infer_rest_conventions = false;
        config
    }
}

/// Builder for [`ApiaryConfig`].
#[derive(Debug, Default)]
pub struct ApiaryConfigBuilder {
    dispatch: Option<DispatchConfig>,
    contract: Option<ContractConfig>,
    telemetry: Option<TelemetryConfigSection>,
}

impl ApiaryConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dispatch configuration.
    #[must_use]
    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Set the contract configuration.
    #[must_use]
    pub fn contract(mut self, contract: ContractConfig) -> Self {
        self.contract = Some(contract);
        self
    }

    /// Set the telemetry configuration.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> ApiaryConfig {
        ApiaryConfig {
            dispatch: self.dispatch.unwrap_or_default(),
            contract: self.contract.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<ApiaryConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IllegalArgumentPolicy;

    #[test]
    fn test_default_config() {
        let config = ApiaryConfig::default();
        assert_eq!(config.dispatch.base_path, "/_api");
        assert_eq!(config.dispatch.auth_timeout_ms, 5000);
        assert!(config.contract.infer_rest_conventions);
        assert!(config.telemetry.logging.enabled);
    }

    #[test]
    fn test_builder_all_sections() {
        let config = ApiaryConfig::builder()
            .dispatch(DispatchConfig {
                default_authenticators: vec!["api_key".to_string()],
                ..Default::default()
            })
            .contract(ContractConfig {
                collect_all_errors: false,
                ..Default::default()
            })
            .build();

        assert_eq!(config.dispatch.default_authenticators, vec!["api_key"]);
        assert!(!config.contract.collect_all_errors);
        assert_eq!(config.telemetry, TelemetryConfigSection::default());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(ApiaryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_relative_base_path() {
        let result = ApiaryConfig::builder()
            .dispatch(DispatchConfig {
                base_path: "_api".to_string(),
                ..Default::default()
            })
            .build_validated();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("base_path"));
    }

    #[test]
    fn test_validate_placeholder_in_base_path() {
        let config = ApiaryConfig::builder()
            .dispatch(DispatchConfig {
                base_path: "/{tenant}".to_string(),
                ..Default::default()
            })
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = ApiaryConfig::builder()
            .dispatch(DispatchConfig {
                auth_timeout_ms: 0,
                ..Default::default()
            })
            .build();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("auth_timeout_ms"));
    }

    #[test]
    fn test_presets() {
        let dev = ApiaryConfig::development();
        assert_eq!(dev.telemetry.logging.format, LogFormat::Pretty);
        assert_eq!(
            dev.dispatch.illegal_argument_status,
            IllegalArgumentPolicy::ServerError
        );

        let prod = ApiaryConfig::production();
        assert_eq!(prod.telemetry.logging.level, "info");
        assert!(!prod.contract.infer_rest_conventions);
        assert!(prod.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ApiaryConfig::development();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[dispatch]"));
        assert!(text.contains("[telemetry.logging]"));
        let parsed: ApiaryConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml_str = r#"
            [dispatch]
            base_path = "/api"
            port = 8080
        "#;

        let result: Result<ApiaryConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }
}
