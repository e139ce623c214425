//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;

use crate::{ApiaryConfig, ConfigError, IllegalArgumentPolicy, LogFormat};

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones field by field:
/// 1. Default values (or a preset)
/// 2. Configuration files (TOML or JSON), in the order added
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use apiary_config::ConfigLoader;
///
/// # fn main() -> Result<(), apiary_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("apiary.toml")?
///     .with_env_prefix("APIARY")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: ApiaryConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ApiaryConfig::default(),
            env_prefix: None,
        }
    }

    /// Reset to default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = ApiaryConfig::default();
        self
    }

    /// Start from the development preset.
    ///
    /// ```
    /// use apiary_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = ApiaryConfig::development();
        self
    }

    /// Start from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = ApiaryConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`. Fields the
    /// file does not mention keep their current value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist or cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some(format @ ("toml" | "json")) => self.with_string(&content, format),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `format` (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or a field is unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use apiary_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [dispatch]
    ///     base_path = "/api"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.dispatch.base_path, "/api");
    /// assert_eq!(config.dispatch.auth_timeout_ms, 5000);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_lowercase().as_str() {
            "toml" => {
                let parsed: toml::Value = toml::from_str(content)?;
                serde_json::to_value(parsed)?
            }
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };

        let mut merged = serde_json::to_value(&self.config)?;
        merge_values(&mut merged, layer);
        self.config = serde_json::from_value(merged)?;
        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`, for example
    /// `APIARY__DISPATCH__BASE_PATH=/api`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvParseError` if the file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::env_parse_error(".env", e.to_string())),
        }
    }

    /// Apply environment overrides, validate, and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or validation fails.
    pub fn load(mut self) -> Result<ApiaryConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Return the configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ApiaryConfig {
        self.config
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let mut vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(key_without_prefix) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__"))
        else {
            // Another variable that merely shares the prefix.
            return Ok(());
        };

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let dispatch = &mut self.config.dispatch;
        let logging = &mut self.config.telemetry.logging;

        match parts.as_slice() {
            ["DISPATCH", "BASE_PATH"] => dispatch.base_path = value.to_string(),
            ["DISPATCH", "ILLEGAL_ARGUMENT_STATUS"] => {
                dispatch.illegal_argument_status = match value.to_lowercase().as_str() {
                    "client_error" | "400" => IllegalArgumentPolicy::ClientError,
                    "server_error" | "500" => IllegalArgumentPolicy::ServerError,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'client_error' or 'server_error'",
                        ))
                    }
                };
            }
            ["DISPATCH", "AUTH_TIMEOUT_MS"] => {
                dispatch.auth_timeout_ms = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["DISPATCH", "DEFAULT_AUTHENTICATORS"] => {
                dispatch.default_authenticators = parse_list(value);
            }
            ["DISPATCH", "DEFAULT_PEER_AUTHENTICATORS"] => {
                dispatch.default_peer_authenticators = parse_list(value);
            }

            ["CONTRACT", "INFER_REST_CONVENTIONS"] => {
                self.config.contract.infer_rest_conventions = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["CONTRACT", "COLLECT_ALL_ERRORS"] => {
                self.config.contract.collect_all_errors = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                logging.include_location = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "LOGGING", "SPAN_EVENTS"] => {
                logging.span_events = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            _ => return Err(ConfigError::unknown_field(key_without_prefix, prefix)),
        }

        Ok(())
    }
}

/// Recursively overlays `layer` onto `base`. Objects merge key by key;
/// everything else replaces.
fn merge_values(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.dispatch.base_path, "/_api");
    }

    #[test]
    fn test_file_layers_over_preset() {
        let toml = r#"
            [dispatch]
            base_path = "/api"
        "#;

        let config = ConfigLoader::new()
            .with_development()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.dispatch.base_path, "/api");
        assert_eq!(config.telemetry.logging.level, "debug");
        assert_eq!(
            config.dispatch.illegal_argument_status,
            IllegalArgumentPolicy::ServerError
        );
    }

    #[test]
    fn test_later_layers_win() {
        let config = ConfigLoader::new()
            .with_string(r#"{"dispatch": {"auth_timeout_ms": 100, "base_path": "/a"}}"#, "json")
            .unwrap()
            .with_string(r#"{"dispatch": {"base_path": "/b"}}"#, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.dispatch.base_path, "/b");
        assert_eq!(config.dispatch.auth_timeout_ms, 100);
    }

    #[test]
    fn test_unknown_field_in_layer_rejected() {
        let result = ConfigLoader::new().with_string("[dispatch]\nport = 1\n", "toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let result = ConfigLoader::new().with_string("dispatch: {}", "yaml");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[contract]\ninfer_rest_conventions = false\n\n[telemetry.logging]\nformat = \"pretty\""
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load()
            .unwrap();

        assert!(!config.contract.infer_rest_conventions);
        assert!(config.contract.collect_all_errors);
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/apiary.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/apiary.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, ApiaryConfig::default());
    }

    #[test]
    fn test_load_validates() {
        let result = ConfigLoader::new()
            .with_string(r#"{"dispatch": {"base_path": "api"}}"#, "json")
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    // set_var is unsafe under edition 2024, so overrides are applied directly.

    #[test]
    fn test_apply_env_var_dispatch() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__DISPATCH__BASE_PATH", "/rpc", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__DISPATCH__ILLEGAL_ARGUMENT_STATUS", "server_error", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__DISPATCH__DEFAULT_AUTHENTICATORS", "api_key, jwt", "TEST")
            .unwrap();

        let dispatch = &loader.config.dispatch;
        assert_eq!(dispatch.base_path, "/rpc");
        assert_eq!(
            dispatch.illegal_argument_status,
            IllegalArgumentPolicy::ServerError
        );
        assert_eq!(dispatch.default_authenticators, vec!["api_key", "jwt"]);
    }

    #[test]
    fn test_apply_env_var_contract_and_logging() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__CONTRACT__COLLECT_ALL_ERRORS", "off", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "pretty", "TEST")
            .unwrap();
        assert!(!loader.config.contract.collect_all_errors);
        assert_eq!(loader.config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_apply_env_var_errors() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TEST__DISPATCH__AUTH_TIMEOUT_MS", "soon", "TEST")
            .is_err());
        assert!(matches!(
            loader.apply_env_var("TEST__DISPATCH__PORT", "80", "TEST"),
            Err(ConfigError::UnknownField { .. })
        ));
        assert!(loader.apply_env_var("TESTING", "1", "TEST").is_ok());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_merge_values_replaces_arrays() {
        let mut base = serde_json::json!({"a": {"list": [1, 2], "keep": true}});
        merge_values(&mut base, serde_json::json!({"a": {"list": [3]}}));
        assert_eq!(base, serde_json::json!({"a": {"list": [3], "keep": true}}));
    }
}
