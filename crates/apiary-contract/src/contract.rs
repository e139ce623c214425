//! The resolved contract.
//!
//! An [`ApiContract`] is produced once per `(api, version)` by the
//! [`ContractBuilder`](crate::ContractBuilder) and never mutated afterwards.
//! It serializes to a JSON snapshot for discovery tooling.

use http::Method;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use apiary_core::fragment::method_serde;
use apiary_core::{
    AuthLevel, CacheControl, FrontendLimits, InjectedKind, Invoker, MethodRef, Namespace,
    ScalarKind, TypeRef, WireType,
};

use crate::schema::{Schema, SchemaType};
use crate::transform::TransformerChain;

/// How a parameter is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "binding", rename_all = "snake_case")]
pub enum ParameterKind {
    /// Bindable scalar, optionally repeated once.
    Scalar {
        /// Scalar kind after transformers.
        scalar: ScalarKind,
        /// One level of repetition.
        repeated: bool,
    },
    /// The request body.
    Resource,
    /// Supplied by the runtime.
    Injected {
        /// What is injected.
        injected: InjectedKind,
    },
    /// Unbound type variable; never on the wire.
    Unresolved,
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterLocation {
    /// Path placeholder.
    Path,
    /// Query string, or a body field of the same name.
    Query,
    /// Whole request body.
    Body,
    /// Runtime-supplied.
    Injected,
    /// Not bound at all.
    None,
}

/// One method parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterConfig {
    /// Wire name; absent for request bodies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Position in the method signature.
    pub position: usize,
    /// Classification.
    #[serde(flatten)]
    pub kind: ParameterKind,
    /// Binding location.
    pub location: ParameterLocation,
    /// May be absent from the request.
    pub nullable: bool,
    /// Parsed default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Resolved declared type.
    pub declared_type: TypeRef,
    /// Wire type and format of scalars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wire_type: Option<WireType>,
    /// Transformers between the declared and the wire type.
    #[serde(skip_serializing_if = "TransformerChain::is_empty")]
    pub transformers: TransformerChain,
}

impl ParameterConfig {
    /// Returns `true` if the parameter is read from the request.
    #[must_use]
    pub fn is_wire(&self) -> bool {
        matches!(
            self.location,
            ParameterLocation::Path | ParameterLocation::Query | ParameterLocation::Body
        )
    }

    /// Returns `true` if the request may omit the parameter.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.nullable || self.default_value.is_some()
    }
}

/// A fully assembled method.
#[derive(Debug, Clone, Serialize)]
pub struct MethodConfig {
    /// `api.resource.name`.
    pub canonical_name: String,
    /// Wire method name.
    pub wire_name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Path template relative to the API root.
    pub path: String,
    /// HTTP verb.
    #[serde(with = "method_serde")]
    pub http_method: Method,
    /// Parameters in signature order.
    pub parameters: Vec<ParameterConfig>,
    /// Request body schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Schema>,
    /// Response schema; absent for empty responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Schema>,
    /// Transformers applied to the return value on write.
    #[serde(skip_serializing_if = "TransformerChain::is_empty")]
    pub response_transformers: TransformerChain,
    /// Authentication level.
    pub auth_level: AuthLevel,
    /// Accepted scopes.
    pub scopes: Vec<String>,
    /// Accepted audiences.
    pub audiences: Vec<String>,
    /// Accepted client ids.
    pub client_ids: Vec<String>,
    /// User authenticator chain.
    pub authenticators: Vec<String>,
    /// Peer authenticator chain.
    pub peer_authenticators: Vec<String>,
    /// Service class and leaf declaration.
    #[serde(skip)]
    pub method: MethodRef,
    /// Service class the method is dispatched on.
    pub service_class: String,
    /// Bound callable of the leaf declaration.
    #[serde(skip)]
    pub invoker: Option<Invoker>,
}

impl MethodConfig {
    /// Parameters read from the request.
    pub fn wire_parameters(&self) -> impl Iterator<Item = &ParameterConfig> {
        self.parameters.iter().filter(|p| p.is_wire())
    }

    /// The request-body parameter, if any.
    #[must_use]
    pub fn body_parameter(&self) -> Option<&ParameterConfig> {
        self.parameters
            .iter()
            .find(|p| p.location == ParameterLocation::Body)
    }
}

/// API-level metadata shared by every method of one contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiMetadata {
    /// API name.
    pub name: String,
    /// API version.
    pub version: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default authentication level.
    pub auth_level: AuthLevel,
    /// Default scopes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    /// Default audiences.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
    /// Default client ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub client_ids: Vec<String>,
    /// Frontend limits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_limits: Option<FrontendLimits>,
    /// Cache control.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
    /// Namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,
}

/// The validated contract of one API version.
#[derive(Debug, Clone, Serialize)]
pub struct ApiContract {
    /// Root metadata.
    #[serde(flatten)]
    pub metadata: ApiMetadata,
    /// Methods by canonical name.
    pub methods: IndexMap<String, Arc<MethodConfig>>,
    /// Registered schema types by id.
    pub schemas: IndexMap<String, SchemaType>,
}

impl ApiContract {
    /// `(name, version)` of the contract.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (&self.metadata.name, &self.metadata.version)
    }

    /// Looks a method up by canonical name.
    #[must_use]
    pub fn method(&self, canonical_name: &str) -> Option<&Arc<MethodConfig>> {
        self.methods.get(canonical_name)
    }

    /// Methods dispatched on `service_class`.
    pub fn methods_of<'a>(
        &'a self,
        service_class: &'a str,
    ) -> impl Iterator<Item = &'a Arc<MethodConfig>> {
        self.methods
            .values()
            .filter(move |m| m.service_class == service_class)
    }

    /// Pretty-printed JSON snapshot.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Every contract produced by one build.
#[derive(Debug, Clone, Default)]
pub struct ContractSet {
    contracts: IndexMap<(String, String), Arc<ApiContract>>,
}

impl ContractSet {
    pub(crate) fn insert(&mut self, contract: ApiContract) {
        let key = (contract.metadata.name.clone(), contract.metadata.version.clone());
        self.contracts.insert(key, Arc::new(contract));
    }

    /// Looks a contract up.
    #[must_use]
    pub fn get(&self, name: &str, version: &str) -> Option<&Arc<ApiContract>> {
        self.contracts.get(&(name.to_string(), version.to_string()))
    }

    /// Iterates the contracts in build order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ApiContract>> {
        self.contracts.values()
    }

    /// Number of contracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Returns `true` if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// The contract that serves `service_class`.
    #[must_use]
    pub fn contract_of(&self, service_class: &str) -> Option<&Arc<ApiContract>> {
        self.iter()
            .find(|c| c.methods.values().any(|m| m.service_class == service_class))
    }
}
