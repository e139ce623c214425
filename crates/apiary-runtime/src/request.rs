//! Transport-facing request and response types.
//!
//! The transport hands the dispatcher a verb, a path and a
//! [`DispatchContext`] holding headers and body bytes. When the dispatcher
//! handles the request it leaves an [`ApiResponse`] in the context.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;

use apiary_core::{Identity, RequestId, ServiceFault};

/// Header carrying the request id on responses.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Lifecycle of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// Route matched, nothing checked yet.
    #[default]
    Unauthenticated,
    /// Running the peer and user authenticator chains.
    Authenticating,
    /// Authentication passed.
    Authorized,
    /// Authentication failed.
    Rejected,
    /// Arguments bound from the request.
    Bound,
    /// The service method ran.
    Invoked,
    /// A response is in the context.
    Responded,
}

impl DispatchState {
    /// Lowercase label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authorized => "authorized",
            Self::Rejected => "rejected",
            Self::Bound => "bound",
            Self::Invoked => "invoked",
            Self::Responded => "responded",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response produced by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body; empty for 204.
    pub body: Bytes,
}

impl ApiResponse {
    /// 204 with no body.
    #[must_use]
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// JSON response with `status`.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(value)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(Self {
            status,
            headers,
            body: Bytes::from(body),
        })
    }

    /// Error envelope for `fault`.
    #[must_use]
    pub fn fault(fault: &ServiceFault, request_id: RequestId) -> Self {
        let envelope = fault.to_envelope(Some(&request_id.to_string()));
        Self::json(fault.status, &envelope).unwrap_or_else(|_| Self {
            status: fault.status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
    }

    /// Deserializes the body as JSON.
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// One inbound request plus the dispatcher's output.
///
/// # Example
///
/// ```
/// use apiary_runtime::DispatchContext;
/// use http::HeaderMap;
///
/// let ctx = DispatchContext::new(HeaderMap::new(), r#"{"message":"hi"}"#)
///     .with_query("limit=3");
/// assert_eq!(ctx.query(), Some("limit=3"));
/// assert!(ctx.response().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    headers: HeaderMap,
    body: Bytes,
    query: Option<String>,
    peer_addr: Option<SocketAddr>,
    request_id: RequestId,
    pub(crate) state: DispatchState,
    pub(crate) identity: Option<Identity>,
    pub(crate) response: Option<ApiResponse>,
}

impl DispatchContext {
    /// Creates a context from headers and body bytes.
    ///
    /// An incoming `x-request-id` header that parses as a request id is
    /// kept; otherwise a fresh one is generated.
    pub fn new(headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let request_id: RequestId = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Self {
            headers,
            body: body.into(),
            request_id,
            ..Self::default()
        }
    }

    /// Sets the raw query string (without `?`).
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets the caller's socket address.
    #[must_use]
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Overrides the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Raw query string.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub(crate) fn set_query_if_absent(&mut self, query: &str) {
        if self.query.is_none() && !query.is_empty() {
            self.query = Some(query.to_string());
        }
    }

    /// Caller's socket address.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Where dispatch stopped.
    #[must_use]
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Identity the authenticator chain produced.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The response, once dispatched.
    #[must_use]
    pub fn response(&self) -> Option<&ApiResponse> {
        self.response.as_ref()
    }

    /// Takes the response out of the context.
    pub fn take_response(&mut self) -> Option<ApiResponse> {
        self.response.take()
    }
}
