//! Raw configuration fragments.
//!
//! Fragments are what an annotation or config source reader hands to the
//! contract engine before assembly: every field is optional, and an unset
//! field means "inherit from the next layer". The engine never parses the
//! source syntax itself.

use http::Method;
use serde::{Deserialize, Serialize};

/// Authentication requirement of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthLevel {
    /// A verified identity is mandatory; requests without one are rejected.
    Required,
    /// The authenticator chain runs, but anonymous callers are admitted.
    Optional,
    /// No user authentication is attempted.
    #[default]
    None,
}

/// Per-API quota rules applied by the frontend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendLimits {
    /// Queries per second allowed for unregistered callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unregistered_user_qps: Option<u32>,
    /// Queries per second allowed per unregistered IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unregistered_qps: Option<u32>,
    /// Daily query budget for unregistered callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unregistered_daily: Option<u32>,
    /// Named rules matched against request properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<FrontendLimitRule>,
}

/// A single frontend quota rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendLimitRule {
    /// Match expression.
    pub matcher: String,
    /// Queries per second.
    pub qps: u32,
    /// Per-user queries per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_qps: Option<u32>,
    /// Daily budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<u32>,
    /// Analytics bucket id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_id: Option<String>,
}

/// Cache directive attached to API responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControl {
    /// Cache type, e.g. `public`, `private`, `no-cache`.
    pub cache_type: String,
    /// Max age in seconds.
    pub max_age: u32,
}

/// Ownership namespace for generated client libraries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Owner domain, e.g. `example.com`.
    pub owner_domain: String,
    /// Owner display name.
    pub owner_name: String,
    /// Package path, may be empty.
    #[serde(default)]
    pub package_path: String,
}

/// API-level configuration declared on a service class.
///
/// All service classes that contribute to the same `(name, version)` API
/// must agree on every field they set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiFragment {
    /// API name, e.g. `library`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// API version, e.g. `v1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default auth level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_level: Option<AuthLevel>,
    /// Default OAuth scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Default token audiences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audiences: Option<Vec<String>>,
    /// Default allowed client ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ids: Option<Vec<String>>,
    /// Default authenticator chain (names).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticators: Option<Vec<String>>,
    /// Default peer authenticator chain (names).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_authenticators: Option<Vec<String>>,
    /// Frontend quota rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_limits: Option<FrontendLimits>,
    /// Response cache directive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
    /// Client library namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,
}

impl ApiFragment {
    /// Creates a fragment naming an API and version.
    #[must_use]
    pub fn named(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            ..Self::default()
        }
    }
}

/// Class-level configuration declared on a service class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFragment {
    /// Resource name grouping the class's methods (`api.resource.method`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Auth level override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_level: Option<AuthLevel>,
    /// Scopes override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Audiences override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audiences: Option<Vec<String>>,
    /// Client ids override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ids: Option<Vec<String>>,
    /// Authenticator chain override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticators: Option<Vec<String>>,
    /// Peer authenticator chain override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_authenticators: Option<Vec<String>>,
}

/// Method-level configuration declared on one method declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFragment {
    /// Wire method name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// REST path template relative to the API root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// HTTP verb.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "optional_method_serde")]
    pub http_method: Option<Method>,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Auth level override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_level: Option<AuthLevel>,
    /// Scopes override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Audiences override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audiences: Option<Vec<String>>,
    /// Client ids override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ids: Option<Vec<String>>,
    /// Authenticator chain override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticators: Option<Vec<String>>,
    /// Peer authenticator chain override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_authenticators: Option<Vec<String>>,
    /// Excludes the method from the contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored: Option<bool>,
}

/// Parameter-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterFragment {
    /// Wire name of the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the parameter may be absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Server-side default, as its wire string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Explicit transformer chain (names), applied domain to wire.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformers: Vec<String>,
}

impl ParameterFragment {
    /// Creates a fragment carrying only a wire name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Marks the parameter nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Appends a transformer to the explicit chain.
    #[must_use]
    pub fn transformer(mut self, name: impl Into<String>) -> Self {
        self.transformers.push(name.into());
        self
    }
}

/// Serde support for HTTP methods.
pub mod method_serde {
    use http::Method;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a method as its upper-case token.
    pub fn serialize<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(method.as_str())
    }

    /// Parses a method token.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Method, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.to_uppercase().parse().map_err(serde::de::Error::custom)
    }
}

mod optional_method_serde {
    use http::Method;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(method: &Option<Method>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match method {
            Some(m) => serializer.serialize_some(m.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Method>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| s.to_uppercase().parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_fragment_roundtrips_verb() {
        let fragment = MethodFragment {
            path: Some("books/{id}".to_string()),
            http_method: Some(Method::PUT),
            ..MethodFragment::default()
        };
        let json = serde_json::to_string(&fragment).expect("serialize");
        assert!(json.contains("\"http_method\":\"PUT\""));

        let parsed: MethodFragment =
            serde_json::from_str(r#"{"http_method":"delete"}"#).expect("deserialize");
        assert_eq!(parsed.http_method, Some(Method::DELETE));
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let json = serde_json::to_string(&ClassFragment::default()).expect("serialize");
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_parameter_fragment_builder() {
        let fragment = ParameterFragment::named("limit")
            .nullable()
            .default_value("20")
            .transformer("clamp");
        assert_eq!(fragment.name.as_deref(), Some("limit"));
        assert_eq!(fragment.nullable, Some(true));
        assert_eq!(fragment.default_value.as_deref(), Some("20"));
        assert_eq!(fragment.transformers, vec!["clamp".to_string()]);
    }

    #[test]
    fn test_default_auth_level_is_none() {
        assert_eq!(AuthLevel::default(), AuthLevel::None);
    }
}
