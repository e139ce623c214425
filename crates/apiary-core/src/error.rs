//! Error types for Apiary.
//!
//! Two families live here:
//!
//! - [`ContractError`] / [`ContractErrors`]: build-time failures. Any of them
//!   aborts contract construction; no partial contract is published.
//! - [`ServiceFault`] / [`InvocationError`]: request-time failures, mapped
//!   to an HTTP status and a serialized [`ErrorEnvelope`].

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::class::MethodRef;

/// Result type alias for service invocations.
pub type ServiceResult<T> = Result<T, InvocationError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Request validation errors (missing or malformed parameters).
    Validation,
    /// Authentication errors (no identity).
    Authentication,
    /// Authorization errors (permission denied).
    Authorization,
    /// Resource not found.
    NotFound,
    /// Rate limiting.
    RateLimited,
    /// Internal server errors.
    Internal,
    /// Downstream service failures.
    External,
    /// Request timeout.
    Timeout,
    /// Conflict (e.g., concurrent modification).
    Conflict,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::External => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Conflict => StatusCode::CONFLICT,
        }
    }

    /// Best-fitting category for an arbitrary status.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Authentication,
            StatusCode::FORBIDDEN => Self::Authorization,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            StatusCode::CONFLICT => Self::Conflict,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => Self::External,
            StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => Self::Timeout,
            s if s.is_client_error() => Self::Validation,
            _ => Self::Internal,
        }
    }
}

/// A declared fault carrying the status and reason it maps to.
///
/// Services, authenticators and the binding stage all report rejections as
/// `ServiceFault`s.
///
/// # Example
///
/// ```
/// use apiary_core::ServiceFault;
/// use http::StatusCode;
///
/// let fault = ServiceFault::not_found("greeting 7 does not exist");
/// assert_eq!(fault.status, StatusCode::NOT_FOUND);
/// assert_eq!(fault.reason, "notFound");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason} ({status}): {message}")]
pub struct ServiceFault {
    /// Response status.
    pub status: StatusCode,
    /// Machine-readable reason code.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
    /// Classification.
    pub category: ErrorCategory,
    /// Additional structured details.
    pub details: Option<serde_json::Value>,
}

impl ServiceFault {
    /// Creates a fault with an explicit status and reason.
    #[must_use]
    pub fn new(status: StatusCode, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            message: message.into(),
            category: ErrorCategory::from_status(status),
            details: None,
        }
    }

    /// 400 with reason `badRequest`.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "badRequest", message)
    }

    /// 401 with reason `required`.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "required", message)
    }

    /// 403 with reason `forbidden`.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    /// 404 with reason `notFound`.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "notFound", message)
    }

    /// 409 with reason `conflict`.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    /// 500 with reason `backendError`.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "backendError", message)
    }

    /// 503 with reason `backendUnavailable`.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "backendUnavailable", message)
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Converts this fault to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.reason.clone(),
                message: self.message.clone(),
                category: self.category,
                details: self.details.clone(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Failure returned by an invoked service method.
#[derive(Error, Debug)]
pub enum InvocationError {
    /// A declared fault; mapped to the status it carries.
    #[error(transparent)]
    Fault(#[from] ServiceFault),

    /// The caller supplied an argument the method rejected.
    ///
    /// Whether this is a 400 or a 500 is a deployment choice.
    #[error("Illegal argument: {message}")]
    IllegalArgument {
        /// Human-readable error message.
        message: String,
    },

    /// Anything else. The source is logged, never serialized.
    #[error("Unexpected failure: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl InvocationError {
    /// Creates an illegal-argument error.
    #[must_use]
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable reason code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Build-time error families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractErrorKind {
    /// Generic or wildcard resolution failed.
    Resolution,
    /// Configuration merge produced an invalid field.
    Assembly,
    /// Cross-method contract conflict or illegal parameter shape.
    Validation,
}

/// A contract build failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
    /// A wildcard reached a resolved signature.
    #[error("{method}: unsupported wildcard '{wildcard}' in type '{ty}'")]
    UnsupportedWildcard {
        /// Offending method.
        method: MethodRef,
        /// Type containing the wildcard.
        ty: String,
        /// The wildcard itself.
        wildcard: String,
    },

    /// A referenced class is missing from the class index.
    #[error("unknown class '{name}' referenced by {referenced_by}")]
    UnknownClass {
        /// Missing class name.
        name: String,
        /// Who referenced it.
        referenced_by: String,
    },

    /// The leaf class does not inherit the declaring class.
    #[error("class '{leaf}' does not inherit from '{declaring}'")]
    NotASubclass {
        /// Leaf class.
        leaf: String,
        /// Declaring class.
        declaring: String,
    },

    /// A registered service class cannot serve requests.
    #[error("'{class}' is not a valid service class: {reason}")]
    InvalidServiceClass {
        /// Class name.
        class: String,
        /// Why.
        reason: String,
    },

    /// A default value does not parse as the parameter type.
    #[error("{method}: default value '{value}' for parameter '{parameter}' is invalid: {reason}")]
    InvalidDefaultValue {
        /// Offending method.
        method: MethodRef,
        /// Parameter wire name.
        parameter: String,
        /// The declared default.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// A path placeholder parameter declares a default.
    #[error("{method}: path parameter '{parameter}' cannot have a default value")]
    DefaultOnPathParameter {
        /// Offending method.
        method: MethodRef,
        /// Parameter wire name.
        parameter: String,
    },

    /// A path placeholder parameter is nullable or repeated.
    #[error("{method}: path parameter '{parameter}' must be a required single value")]
    NullablePathParameter {
        /// Offending method.
        method: MethodRef,
        /// Parameter wire name.
        parameter: String,
    },

    /// The return type cannot be a response body.
    #[error("{method}: return type '{ty}' is not a resource type")]
    InvalidReturnType {
        /// Offending method.
        method: MethodRef,
        /// Resolved return type.
        ty: String,
    },

    /// A transformer chain is unknown, cyclic or ends in an unrepresentable type.
    #[error("{method}: transformer chain for '{ty}' is invalid: {reason}")]
    TransformerChain {
        /// Offending method.
        method: MethodRef,
        /// Source type of the chain.
        ty: String,
        /// What went wrong.
        reason: String,
    },

    /// REST inference is disabled and the method lacks a path or verb.
    #[error("{method}: missing explicit {missing} and REST conventions are disabled")]
    MissingRestConfiguration {
        /// Offending method.
        method: MethodRef,
        /// `path`, `http method` or both.
        missing: String,
    },

    /// A path template is malformed or references unknown parameters.
    #[error("{method}: invalid path '{path}': {reason}")]
    InvalidPath {
        /// Offending method.
        method: MethodRef,
        /// The template.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// Two methods share the same verb and path shape.
    #[error("{first} and {second} both map to {verb} {shape}")]
    DuplicateRestPath {
        /// HTTP verb.
        verb: String,
        /// Path with placeholders normalized to `{}`.
        shape: String,
        /// First method.
        first: MethodRef,
        /// Second method.
        second: MethodRef,
    },

    /// Two declarations share an erased name but are not a valid override.
    #[error("{first} conflicts with {second}: {reason}")]
    OverloadedMethod {
        /// First declaration.
        first: MethodRef,
        /// Second declaration.
        second: MethodRef,
        /// What makes them incompatible.
        reason: String,
    },

    /// A parameter nests one repetition inside another.
    #[error("{method}: parameter '{parameter}' of type '{ty}' nests collections")]
    NestedCollection {
        /// Offending method.
        method: MethodRef,
        /// Parameter name or position.
        parameter: String,
        /// Declared type.
        ty: String,
    },

    /// A parameter cannot be encoded without a wire name.
    #[error("{method}: {reason}")]
    MissingParameterName {
        /// Offending method.
        method: MethodRef,
        /// What is missing.
        reason: String,
    },

    /// Two parameters of one method share a wire name.
    #[error("{method}: duplicate parameter name '{parameter}'")]
    DuplicateParameterName {
        /// Offending method.
        method: MethodRef,
        /// Colliding name.
        parameter: String,
    },

    /// An unresolved type variable is bound to the wire.
    #[error("{method}: parameter '{parameter}' has unresolved type '{ty}'")]
    UnresolvedWireParameter {
        /// Offending method.
        method: MethodRef,
        /// Parameter name.
        parameter: String,
        /// Unresolved type.
        ty: String,
    },

    /// Two methods resolve to the same canonical name.
    #[error("{first} and {second} share the method name '{name}'")]
    DuplicateMethodName {
        /// Canonical name.
        name: String,
        /// First method.
        first: MethodRef,
        /// Second method.
        second: MethodRef,
    },

    /// Service classes of one API disagree on an API-level field.
    #[error("API {api} {version}: '{class}' declares a different {field}")]
    InconsistentApiConfig {
        /// API name.
        api: String,
        /// API version.
        version: String,
        /// Disagreeing class.
        class: String,
        /// Field name.
        field: String,
    },
}

impl ContractError {
    /// Returns the error family.
    #[must_use]
    pub const fn kind(&self) -> ContractErrorKind {
        match self {
            Self::UnsupportedWildcard { .. }
            | Self::UnknownClass { .. }
            | Self::NotASubclass { .. }
            | Self::InvalidServiceClass { .. } => ContractErrorKind::Resolution,
            Self::InvalidDefaultValue { .. }
            | Self::DefaultOnPathParameter { .. }
            | Self::NullablePathParameter { .. }
            | Self::InvalidReturnType { .. }
            | Self::TransformerChain { .. }
            | Self::MissingRestConfiguration { .. }
            | Self::InvalidPath { .. } => ContractErrorKind::Assembly,
            Self::DuplicateRestPath { .. }
            | Self::OverloadedMethod { .. }
            | Self::NestedCollection { .. }
            | Self::MissingParameterName { .. }
            | Self::DuplicateParameterName { .. }
            | Self::UnresolvedWireParameter { .. }
            | Self::DuplicateMethodName { .. }
            | Self::InconsistentApiConfig { .. } => ContractErrorKind::Validation,
        }
    }
}

/// Every error collected while building one batch of contracts.
#[derive(Error, Debug, Clone, PartialEq, Default)]
#[error("contract build failed with {} error(s): {}", .0.len(), summarize(.0))]
pub struct ContractErrors(pub Vec<ContractError>);

fn summarize(errors: &[ContractError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ContractErrors {
    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the errors in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, ContractError> {
        self.0.iter()
    }

    /// Adds an error.
    pub fn push(&mut self, error: ContractError) {
        self.0.push(error);
    }
}

impl From<ContractError> for ContractErrors {
    fn from(error: ContractError) -> Self {
        Self(vec![error])
    }
}

impl IntoIterator for ContractErrors {
    type Item = ContractError;
    type IntoIter = std::vec::IntoIter<ContractError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method() -> MethodRef {
        MethodRef::new("GreetingService", "insert", vec!["Long[][]".to_string()])
    }

    #[test]
    fn test_fault_envelope() {
        let fault = ServiceFault::bad_request("id is required")
            .with_details(serde_json::json!({ "parameter": "id" }));
        let envelope = fault.to_envelope(Some("req-123"));

        let json = serde_json::to_value(&envelope).expect("serialization should work");
        assert_eq!(json["error"]["code"], "badRequest");
        assert_eq!(json["error"]["category"], "validation");
        assert_eq!(json["error"]["details"]["parameter"], "id");
        assert_eq!(json["request_id"], "req-123");
    }

    #[test]
    fn test_category_from_status() {
        assert_eq!(
            ErrorCategory::from_status(StatusCode::UNAUTHORIZED),
            ErrorCategory::Authentication
        );
        assert_eq!(
            ErrorCategory::from_status(StatusCode::UNPROCESSABLE_ENTITY),
            ErrorCategory::Validation
        );
        assert_eq!(
            ErrorCategory::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_invocation_error_from_fault() {
        let err: InvocationError = ServiceFault::conflict("stale").into();
        assert!(matches!(err, InvocationError::Fault(ref f) if f.status == StatusCode::CONFLICT));
        assert!(err.to_string().contains("stale"));
    }

    #[test]
    fn test_contract_error_kinds_and_messages() {
        let nested = ContractError::NestedCollection {
            method: method(),
            parameter: "ids".to_string(),
            ty: "Long[][]".to_string(),
        };
        assert_eq!(nested.kind(), ContractErrorKind::Validation);
        assert!(nested.to_string().contains("GreetingService.insert(Long[][])"));

        let wildcard = ContractError::UnsupportedWildcard {
            method: method(),
            ty: "List<? extends Number>".to_string(),
            wildcard: "? extends Number".to_string(),
        };
        assert_eq!(wildcard.kind(), ContractErrorKind::Resolution);
    }

    #[test]
    fn test_contract_errors_display_lists_all() {
        let mut errors = ContractErrors::default();
        errors.push(ContractError::UnknownClass {
            name: "Widget".to_string(),
            referenced_by: "Shop.buy".to_string(),
        });
        errors.push(ContractError::MissingRestConfiguration {
            method: method(),
            missing: "path".to_string(),
        });
        let message = errors.to_string();
        assert!(message.starts_with("contract build failed with 2 error(s)"));
        assert!(message.contains("Widget"));
        assert!(message.contains("missing explicit path"));
    }
}
