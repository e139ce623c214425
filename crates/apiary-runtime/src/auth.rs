//! Authentication chains.
//!
//! Two independent chains guard every method:
//!
//! - **Peer authenticators** verify the calling *system* (for example a
//!   SPIFFE id set by the sidecar). They run first, and a failure answers
//!   `404 Not Found` so restricted internal methods stay invisible.
//! - **Authenticators** produce the end-user [`Identity`]. They run in
//!   order and the first identity that satisfies the method's scopes,
//!   audiences and client ids wins.
//!
//! Each call is bounded by `dispatch.auth_timeout_ms`; a timeout counts as
//! "no identity" (or "not verified") for that step.

use http::header::AUTHORIZATION;
use http::HeaderMap;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use apiary_config::DispatchConfig;
use apiary_contract::MethodConfig;
use apiary_core::{AuthLevel, Identity, RequestId, ServiceFault};
use apiary_telemetry::metrics::record_auth_rejection;

/// Header carrying the caller's SPIFFE id, set by the ingress or sidecar.
pub const SPIFFE_ID_HEADER: &str = "x-spiffe-id";

/// Header carrying an API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// A boxed future borrowing from the authenticator and its context.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-request state handed to every authenticator in a chain.
///
/// Authenticators may leave attributes for the ones after them.
#[derive(Debug, Clone)]
pub struct AuthenticationContext {
    method: Arc<MethodConfig>,
    headers: HeaderMap,
    peer_addr: Option<SocketAddr>,
    request_id: RequestId,
    attributes: HashMap<String, Value>,
}

impl AuthenticationContext {
    /// Creates a context for one request to `method`.
    #[must_use]
    pub fn new(method: Arc<MethodConfig>, headers: HeaderMap, request_id: RequestId) -> Self {
        Self {
            method,
            headers,
            peer_addr: None,
            request_id,
            attributes: HashMap::new(),
        }
    }

    /// Sets the caller's socket address.
    #[must_use]
    pub fn with_peer_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.peer_addr = addr;
        self
    }

    /// The method being called.
    #[must_use]
    pub fn method(&self) -> &MethodConfig {
        &self.method
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The `Authorization: Bearer` token, if present.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.headers.get(AUTHORIZATION)?.to_str().ok()?;
        value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// The caller's socket address.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Attribute left by an earlier authenticator.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Leaves an attribute for later authenticators.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }
}

/// Produces the end-user identity of a request.
///
/// Returning `None` passes the request on to the next authenticator.
pub trait Authenticator: Send + Sync {
    /// Authenticates the request.
    fn authenticate<'a>(
        &'a self,
        ctx: &'a mut AuthenticationContext,
    ) -> BoxFuture<'a, Option<Identity>>;
}

/// Verifies the system a request comes from.
pub trait PeerAuthenticator: Send + Sync {
    /// Returns `true` if the caller may see the method.
    fn verify<'a>(&'a self, ctx: &'a mut AuthenticationContext) -> BoxFuture<'a, bool>;
}

/// Named authenticators that method chains refer to.
#[derive(Clone, Default)]
pub struct AuthenticatorSet {
    authenticators: IndexMap<String, Arc<dyn Authenticator>>,
    peers: IndexMap<String, Arc<dyn PeerAuthenticator>>,
}

impl fmt::Debug for AuthenticatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatorSet")
            .field("authenticators", &self.authenticators.keys().collect::<Vec<_>>())
            .field("peers", &self.peers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AuthenticatorSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user authenticator under `name`.
    #[must_use]
    pub fn with_authenticator(
        mut self,
        name: impl Into<String>,
        authenticator: impl Authenticator + 'static,
    ) -> Self {
        self.authenticators
            .insert(name.into(), Arc::new(authenticator));
        self
    }

    /// Adds a peer authenticator under `name`.
    #[must_use]
    pub fn with_peer_authenticator(
        mut self,
        name: impl Into<String>,
        authenticator: impl PeerAuthenticator + 'static,
    ) -> Self {
        self.peers.insert(name.into(), Arc::new(authenticator));
        self
    }

    /// Looks a user authenticator up.
    #[must_use]
    pub fn authenticator(&self, name: &str) -> Option<&Arc<dyn Authenticator>> {
        self.authenticators.get(name)
    }

    /// Looks a peer authenticator up.
    #[must_use]
    pub fn peer_authenticator(&self, name: &str) -> Option<&Arc<dyn PeerAuthenticator>> {
        self.peers.get(name)
    }
}

fn chain<'a>(declared: &'a [String], defaults: &'a [String]) -> &'a [String] {
    if declared.is_empty() {
        defaults
    } else {
        declared
    }
}

fn unknown(kind: &str, name: &str) -> ServiceFault {
    warn!(authenticator = name, kind, "Method names an unregistered authenticator");
    ServiceFault::internal("authentication is misconfigured")
}

/// Runs the peer chain and then the user chain for one request.
///
/// Returns the winning identity, `None` for anonymous access, or the fault
/// to answer with.
pub async fn authenticate(
    set: &AuthenticatorSet,
    config: &DispatchConfig,
    ctx: &mut AuthenticationContext,
) -> Result<Option<Identity>, ServiceFault> {
    let method = Arc::clone(&ctx.method);
    let timeout = config.auth_timeout();

    for name in chain(&method.peer_authenticators, &config.default_peer_authenticators) {
        let peer = set
            .peer_authenticator(name)
            .ok_or_else(|| unknown("peer", name))?;
        if !bounded(timeout, name, peer.verify(ctx)).await.unwrap_or(false) {
            debug!(authenticator = %name, "Peer verification failed");
            record_auth_rejection("peer");
            return Err(ServiceFault::not_found("method not found"));
        }
    }

    if method.auth_level == AuthLevel::None {
        return Ok(None);
    }

    for name in chain(&method.authenticators, &config.default_authenticators) {
        let authenticator = set
            .authenticator(name)
            .ok_or_else(|| unknown("user", name))?;
        let Some(identity) = bounded(timeout, name, authenticator.authenticate(ctx))
            .await
            .flatten()
        else {
            continue;
        };
        if identity.has_any_scope(&method.scopes)
            && identity.matches_audience(&method.audiences)
            && identity.matches_client_id(&method.client_ids)
        {
            debug!(authenticator = %name, user = %identity.log_id(), "Authenticated");
            return Ok(Some(identity));
        }
        debug!(
            authenticator = %name,
            user = %identity.log_id(),
            "Identity does not satisfy the method's scopes, audiences or client ids"
        );
    }

    if method.auth_level == AuthLevel::Required {
        record_auth_rejection("required");
        return Err(ServiceFault::unauthorized("authentication required"));
    }
    Ok(None)
}

async fn bounded<T>(timeout: Duration, name: &str, step: BoxFuture<'_, T>) -> Option<T> {
    match tokio::time::timeout(timeout, step).await {
        Ok(out) => Some(out),
        Err(_) => {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(authenticator = name, timeout_ms, "Authenticator timed out");
            record_auth_rejection("timeout");
            None
        }
    }
}

/// Maps `x-api-key` values to identities.
///
/// ```
/// use apiary_core::Identity;
/// use apiary_runtime::ApiKeyAuthenticator;
///
/// let keys = ApiKeyAuthenticator::new().with_key("k-123", Identity::new("ci-bot"));
/// assert_eq!(keys.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ApiKeyAuthenticator {
    keys: HashMap<String, Identity>,
}

impl ApiKeyAuthenticator {
    /// Creates an authenticator with no keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `key` as `identity`.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>, identity: Identity) -> Self {
        self.keys.insert(key.into(), identity);
        self
    }

    /// Number of known keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no key is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn authenticate<'a>(
        &'a self,
        ctx: &'a mut AuthenticationContext,
    ) -> BoxFuture<'a, Option<Identity>> {
        Box::pin(async move {
            let identity = self.keys.get(ctx.header(API_KEY_HEADER)?)?.clone();
            ctx.set_attribute("credential", "api_key");
            Some(identity)
        })
    }
}

/// Maps opaque bearer tokens to identities.
///
/// Tokens are compared verbatim; nothing is decoded or verified.
#[derive(Debug, Clone, Default)]
pub struct BearerTokenAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl BearerTokenAuthenticator {
    /// Creates an authenticator with no tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `token` as `identity`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

impl Authenticator for BearerTokenAuthenticator {
    fn authenticate<'a>(
        &'a self,
        ctx: &'a mut AuthenticationContext,
    ) -> BoxFuture<'a, Option<Identity>> {
        Box::pin(async move {
            let identity = self.tokens.get(ctx.bearer_token()?)?.clone();
            ctx.set_attribute("credential", "bearer");
            Some(identity)
        })
    }
}

/// Accepts callers whose `x-spiffe-id` belongs to a trust domain.
///
/// ```
/// use apiary_runtime::SpiffePeerAuthenticator;
///
/// let peers = SpiffePeerAuthenticator::new("prod.example.com").allow_path("/ns/billing/");
/// assert!(peers.accepts("spiffe://prod.example.com/ns/billing/sa/worker"));
/// assert!(!peers.accepts("spiffe://prod.example.com/ns/web/sa/frontend"));
/// assert!(!peers.accepts("spiffe://dev.example.com/ns/billing/sa/worker"));
/// ```
#[derive(Debug, Clone)]
pub struct SpiffePeerAuthenticator {
    trust_domain: String,
    allowed_paths: Vec<String>,
}

impl SpiffePeerAuthenticator {
    /// Accepts every workload of `trust_domain`.
    #[must_use]
    pub fn new(trust_domain: impl Into<String>) -> Self {
        Self {
            trust_domain: trust_domain.into(),
            allowed_paths: Vec::new(),
        }
    }

    /// Restricts callers to workload paths starting with `prefix`.
    #[must_use]
    pub fn allow_path(mut self, prefix: impl Into<String>) -> Self {
        self.allowed_paths.push(prefix.into());
        self
    }

    /// Returns `true` if `spiffe_id` is an accepted caller.
    #[must_use]
    pub fn accepts(&self, spiffe_id: &str) -> bool {
        let Some(rest) = spiffe_id.strip_prefix("spiffe://") else {
            return false;
        };
        let (domain, path) = rest.find('/').map_or((rest, "/"), |i| rest.split_at(i));
        domain == self.trust_domain
            && (self.allowed_paths.is_empty()
                || self.allowed_paths.iter().any(|p| path.starts_with(p.as_str())))
    }
}

impl PeerAuthenticator for SpiffePeerAuthenticator {
    fn verify<'a>(&'a self, ctx: &'a mut AuthenticationContext) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let Some(id) = ctx.header(SPIFFE_ID_HEADER).map(str::to_string) else {
                return false;
            };
            let accepted = self.accepts(&id);
            if accepted {
                ctx.set_attribute("peer", id);
            }
            accepted
        })
    }
}

/// Authenticator backed by a synchronous closure.
pub struct FnAuthenticator<F> {
    f: F,
}

impl<F> FnAuthenticator<F>
where
    F: Fn(&mut AuthenticationContext) -> Option<Identity> + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Authenticator for FnAuthenticator<F>
where
    F: Fn(&mut AuthenticationContext) -> Option<Identity> + Send + Sync,
{
    fn authenticate<'a>(
        &'a self,
        ctx: &'a mut AuthenticationContext,
    ) -> BoxFuture<'a, Option<Identity>> {
        let identity = (self.f)(ctx);
        Box::pin(async move { identity })
    }
}

/// Peer authenticator backed by a synchronous closure.
pub struct FnPeerAuthenticator<F> {
    f: F,
}

impl<F> FnPeerAuthenticator<F>
where
    F: Fn(&AuthenticationContext) -> bool + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> PeerAuthenticator for FnPeerAuthenticator<F>
where
    F: Fn(&AuthenticationContext) -> bool + Send + Sync,
{
    fn verify<'a>(&'a self, ctx: &'a mut AuthenticationContext) -> BoxFuture<'a, bool> {
        let verified = (self.f)(ctx);
        Box::pin(async move { verified })
    }
}
