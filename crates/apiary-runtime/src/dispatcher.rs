//! Request dispatch.
//!
//! [`RequestDispatcher::dispatch`] takes one request through
//! `Unauthenticated -> Authenticating -> Authorized | Rejected -> Bound ->
//! Invoked -> Responded` and leaves the response in the context.

use bytes::Bytes;
use http::header::HeaderValue;
use http::{Method, Request, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use apiary_config::DispatchConfig;
use apiary_contract::MethodConfig;
use apiary_core::{Arguments, InvocationError, RequestId, ServiceFault};
use apiary_router::Params;
use apiary_telemetry::metrics::record_dispatch;

use crate::auth::{authenticate, AuthenticationContext, AuthenticatorSet};
use crate::binding::{bind_arguments, BindingInput};
use crate::registry::{RouteTarget, ServiceRegistry};
use crate::request::{ApiResponse, DispatchContext, DispatchState, REQUEST_ID_HEADER};

/// Routes requests to registered services.
///
/// Cheap to share: clone the `Arc` it lives in, not the dispatcher.
#[derive(Debug)]
pub struct RequestDispatcher {
    registry: Arc<ServiceRegistry>,
    authenticators: AuthenticatorSet,
    config: DispatchConfig,
}

impl RequestDispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub fn new(
        registry: Arc<ServiceRegistry>,
        authenticators: AuthenticatorSet,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            authenticators,
            config,
        }
    }

    /// The registry requests are routed against.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Dispatch settings.
    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatches one request.
    ///
    /// `path` may carry a `?query`, used when the context has none. Returns
    /// `false` without touching the context if no registered method matches
    /// the verb and path, so the transport can fall through to other
    /// handlers. Otherwise the response is in the context.
    pub async fn dispatch(&self, method: &Method, path: &str, ctx: &mut DispatchContext) -> bool {
        let path = match path.split_once('?') {
            Some((path, query)) => {
                ctx.set_query_if_absent(query);
                path
            }
            None => path,
        };

        let snapshot = self.registry.snapshot();
        let Some((target, params)) = snapshot.route(method, path) else {
            debug!(method = %method, path, "No method matches");
            return false;
        };

        let span = info_span!(
            "dispatch",
            method = %method,
            path,
            request_id = %ctx.request_id(),
            api_method = %target.config.canonical_name,
        );
        let started = Instant::now();
        let mut response = self.run(&target, &params, ctx).instrument(span).await;

        if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
            response.headers.insert(REQUEST_ID_HEADER, value);
        }
        record_dispatch(
            &target.config.canonical_name,
            response.status.as_u16(),
            started.elapsed(),
        );
        ctx.response = Some(response);
        advance(ctx, DispatchState::Responded);
        true
    }

    /// Dispatches an `http::Request`, for transports built on the `http`
    /// types.
    ///
    /// Returns `None` when no registered method matches.
    pub async fn handle(&self, request: Request<Bytes>) -> Option<Response<Bytes>> {
        let (parts, body) = request.into_parts();
        let mut ctx = DispatchContext::new(parts.headers, body);
        if let Some(query) = parts.uri.query() {
            ctx = ctx.with_query(query);
        }
        if !self.dispatch(&parts.method, parts.uri.path(), &mut ctx).await {
            return None;
        }
        let api = ctx.take_response()?;
        let mut response = Response::new(api.body);
        *response.status_mut() = api.status;
        *response.headers_mut() = api.headers;
        Some(response)
    }

    async fn run(
        &self,
        target: &RouteTarget,
        params: &Params,
        ctx: &mut DispatchContext,
    ) -> ApiResponse {
        let method = &target.config;
        let request_id = ctx.request_id();

        advance(ctx, DispatchState::Authenticating);
        let mut auth = AuthenticationContext::new(Arc::clone(method), ctx.headers().clone(), request_id)
            .with_peer_addr(ctx.peer_addr());
        let identity = match authenticate(&self.authenticators, &self.config, &mut auth).await {
            Ok(identity) => identity,
            Err(fault) => {
                advance(ctx, DispatchState::Rejected);
                return respond_with_fault(&fault, request_id);
            }
        };
        if let Some(identity) = &identity {
            debug!(user = %identity.log_id(), "Caller identified");
        }
        ctx.identity.clone_from(&identity);
        advance(ctx, DispatchState::Authorized);

        let input = BindingInput {
            params,
            query: ctx.query(),
            body: ctx.body(),
            headers: ctx.headers(),
            identity: identity.as_ref(),
        };
        let values = match bind_arguments(method, &input) {
            Ok(values) => values,
            Err(fault) => return respond_with_fault(&fault, request_id),
        };
        advance(ctx, DispatchState::Bound);

        let Some(invoker) = &method.invoker else {
            let fault = ServiceFault::internal("Internal error");
            return respond_with_fault(&fault, request_id);
        };
        let args = Arguments::new(values)
            .with_identity(identity)
            .with_headers(ctx.headers().clone())
            .with_request_id(request_id);
        let outcome = invoker
            .invoke(Arc::clone(&target.registration.instance), args)
            .await;
        advance(ctx, DispatchState::Invoked);

        match outcome {
            Ok(value) => success(method, value)
                .unwrap_or_else(|fault| respond_with_fault(&fault, request_id)),
            Err(err) => {
                let fault = self.fault_for(err);
                respond_with_fault(&fault, request_id)
            }
        }
    }

    fn fault_for(&self, err: InvocationError) -> ServiceFault {
        match err {
            InvocationError::Fault(fault) => fault,
            InvocationError::IllegalArgument { message } => {
                let status = self.config.illegal_argument_status.status();
                if status == StatusCode::BAD_REQUEST {
                    ServiceFault::bad_request(message)
                } else {
                    warn!(%message, "Illegal argument treated as a server fault");
                    ServiceFault::new(status, "backendError", "Internal error")
                }
            }
            InvocationError::Unexpected(source) => {
                error!(error = %source, "Service method failed");
                ServiceFault::internal("Internal error")
            }
        }
    }
}

fn advance(ctx: &mut DispatchContext, next: DispatchState) {
    debug!(from = %ctx.state, to = %next, "Dispatch state");
    ctx.state = next;
}

fn success(method: &MethodConfig, value: Value) -> Result<ApiResponse, ServiceFault> {
    if method.response.is_none() || value.is_null() {
        info!(status = 204u16, "Request handled");
        return Ok(ApiResponse::no_content());
    }
    let value = method.response_transformers.to_wire(value).map_err(|e| {
        error!(error = %e, "Response transformer failed");
        ServiceFault::internal("Internal error")
    })?;
    let response = ApiResponse::json(StatusCode::OK, &value).map_err(|e| {
        error!(error = %e, "Response serialization failed");
        ServiceFault::internal("Internal error")
    })?;
    info!(status = 200u16, "Request handled");
    Ok(response)
}

fn respond_with_fault(fault: &ServiceFault, request_id: RequestId) -> ApiResponse {
    let status = fault.status.as_u16();
    if fault.status.is_server_error() {
        error!(status = status, reason = %fault.reason, message = %fault.message, "Request failed");
    } else {
        info!(status = status, reason = %fault.reason, message = %fault.message, "Request rejected");
    }
    ApiResponse::fault(fault, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ApiKeyAuthenticator, API_KEY_HEADER};
    use apiary_config::IllegalArgumentPolicy;
    use apiary_contract::ContractBuilder;
    use apiary_core::fixtures::{self, Greeting, GreetingStore};
    use apiary_core::{
        AuthLevel, ClassDef, ClassIndex, Identity, Invoker, MethodDef, ParamDef, Primitive,
        ServiceInstance, TypeRef,
    };
    use apiary_core::{ApiFragment, MethodFragment};
    use http::HeaderMap;
    use serde_json::json;

    fn store() -> Arc<GreetingStore> {
        Arc::new(GreetingStore::with_greetings(vec![
            Greeting {
                id: 1,
                message: "hello world".into(),
                color: None,
            },
            Greeting {
                id: 2,
                message: "goodbye world".into(),
                color: Some("RED".into()),
            },
        ]))
    }

    fn dispatcher(config: DispatchConfig) -> RequestDispatcher {
        let contracts = ContractBuilder::new(fixtures::greeting_index())
            .service("GreetingService")
            .build()
            .unwrap();
        let registry = Arc::new(ServiceRegistry::new(config.base_path.clone()));
        let instance: ServiceInstance = store();
        registry
            .register(contracts.get("greetings", "v1").unwrap(), "GreetingService", instance)
            .unwrap();
        let authenticators = AuthenticatorSet::new().with_authenticator(
            "keys",
            ApiKeyAuthenticator::new().with_key("secret", Identity::new("admin")),
        );
        RequestDispatcher::new(
            registry,
            authenticators,
            DispatchConfig {
                default_authenticators: vec!["keys".to_string()],
                ..config
            },
        )
    }

    fn empty() -> DispatchContext {
        DispatchContext::new(HeaderMap::new(), Bytes::new())
    }

    #[tokio::test]
    async fn test_get_returns_json() {
        let dispatcher = dispatcher(DispatchConfig::default());
        let mut ctx = empty();
        assert!(
            dispatcher
                .dispatch(&Method::GET, "/_api/greetings/v1/greeting/get/1", &mut ctx)
                .await
        );
        assert_eq!(ctx.state(), DispatchState::Responded);
        let response = ctx.response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.headers[REQUEST_ID_HEADER],
            ctx.request_id().to_string().as_str()
        );
        let greeting: Greeting = response.json_body().unwrap();
        assert_eq!(greeting.message, "hello world");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_handled() {
        let dispatcher = dispatcher(DispatchConfig::default());
        let mut ctx = empty();
        assert!(
            !dispatcher
                .dispatch(&Method::GET, "/_api/greetings/v1/nope", &mut ctx)
                .await
        );
        assert!(ctx.response().is_none());
        assert_eq!(ctx.state(), DispatchState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_service_fault_keeps_its_status() {
        let dispatcher = dispatcher(DispatchConfig::default());
        let mut ctx = empty();
        dispatcher
            .dispatch(&Method::GET, "/_api/greetings/v1/greeting/get/99", &mut ctx)
            .await;
        let response = ctx.response().unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        let body: Value = response.json_body().unwrap();
        assert_eq!(body["error"]["code"], "notFound");
        assert_eq!(body["request_id"], ctx.request_id().to_string());
    }

    #[tokio::test]
    async fn test_required_auth_rejects_then_accepts() {
        let dispatcher = dispatcher(DispatchConfig::default());

        let mut ctx = empty();
        dispatcher
            .dispatch(&Method::DELETE, "/_api/greetings/v1/greeting/remove/1", &mut ctx)
            .await;
        assert_eq!(ctx.response().unwrap().status, StatusCode::UNAUTHORIZED);
        assert!(ctx.identity().is_none());

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        let mut ctx = DispatchContext::new(headers, Bytes::new());
        dispatcher
            .dispatch(&Method::DELETE, "/_api/greetings/v1/greeting/remove/1", &mut ctx)
            .await;
        assert_eq!(ctx.response().unwrap().status, StatusCode::NO_CONTENT);
        assert!(ctx.response().unwrap().body.is_empty());
        assert_eq!(ctx.identity().unwrap().id, "admin");
    }

    #[tokio::test]
    async fn test_query_in_path() {
        let dispatcher = dispatcher(DispatchConfig::default());
        let mut ctx = empty();
        dispatcher
            .dispatch(
                &Method::GET,
                "/_api/greetings/v1/greeting/search?words=goodbye&limit=5",
                &mut ctx,
            )
            .await;
        let found: Vec<Greeting> = ctx.response().unwrap().json_body().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);
    }

    #[tokio::test]
    async fn test_binding_failure_is_bad_request() {
        let dispatcher = dispatcher(DispatchConfig::default());
        let mut ctx = DispatchContext::new(HeaderMap::new(), "not json");
        dispatcher
            .dispatch(&Method::POST, "/_api/greetings/v1/greeting/insert", &mut ctx)
            .await;
        assert_eq!(ctx.response().unwrap().status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_handle_http_request() {
        let dispatcher = dispatcher(DispatchConfig::default());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/_api/greetings/v1/greeting/insert")
            .body(Bytes::from_static(br#"{"message":"new"}"#))
            .unwrap();
        let response = dispatcher.handle(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created: Greeting = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(created.id, 3);

        let request = Request::builder()
            .uri("/elsewhere")
            .body(Bytes::new())
            .unwrap();
        assert!(dispatcher.handle(request).await.is_none());
    }

    struct Strict;

    fn strict_index() -> ClassIndex {
        ClassIndex::new().with(
            ClassDef::concrete("StrictService")
                .api(ApiFragment {
                    auth_level: Some(AuthLevel::None),
                    ..ApiFragment::named("strict", "v1")
                })
                .method(
                    MethodDef::new("check")
                        .param(ParamDef::named("n", TypeRef::primitive(Primitive::Int)))
                        .returns(TypeRef::class("Greeting"))
                        .with_config(MethodFragment {
                            path: Some("check".to_string()),
                            http_method: Some(Method::GET),
                            ..Default::default()
                        })
                        .invoker(Invoker::new(|_svc: Arc<Strict>, args: Arguments| async move {
                            let n: i32 = args.get(0)?;
                            if n < 0 {
                                return Err(InvocationError::illegal_argument("n must not be negative"));
                            }
                            if n == 0 {
                                return Err(anyhow::anyhow!("disk on fire").into());
                            }
                            Ok(json!({"id": n, "message": "ok"}))
                        })),
                ),
        )
        .with(fixtures::greeting_class())
        .with(fixtures::color_enum())
    }

    fn strict_dispatcher(policy: IllegalArgumentPolicy) -> RequestDispatcher {
        let contracts = ContractBuilder::new(strict_index())
            .service("StrictService")
            .build()
            .unwrap();
        let registry = Arc::new(ServiceRegistry::new("/_api"));
        registry
            .register(contracts.get("strict", "v1").unwrap(), "StrictService", Arc::new(Strict))
            .unwrap();
        RequestDispatcher::new(
            registry,
            AuthenticatorSet::new(),
            DispatchConfig {
                illegal_argument_status: policy,
                ..DispatchConfig::default()
            },
        )
    }

    async fn check(dispatcher: &RequestDispatcher, n: i32) -> ApiResponse {
        let mut ctx = empty().with_query(format!("n={n}"));
        assert!(
            dispatcher
                .dispatch(&Method::GET, "/_api/strict/v1/check", &mut ctx)
                .await
        );
        ctx.take_response().unwrap()
    }

    #[tokio::test]
    async fn test_illegal_argument_policy() {
        let client = strict_dispatcher(IllegalArgumentPolicy::ClientError);
        let response = check(&client, -1).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        let body: Value = response.json_body().unwrap();
        assert_eq!(body["error"]["message"], "n must not be negative");

        let server = strict_dispatcher(IllegalArgumentPolicy::ServerError);
        let response = check(&server, -1).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json_body().unwrap();
        assert_eq!(body["error"]["message"], "Internal error");

        assert_eq!(check(&server, 3).await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unexpected_failure_hides_its_source() {
        let dispatcher = strict_dispatcher(IllegalArgumentPolicy::ClientError);
        let response = check(&dispatcher, 0).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json_body().unwrap();
        assert_eq!(body["error"]["code"], "backendError");
        assert!(!String::from_utf8_lossy(&response.body).contains("disk on fire"));
    }
}
