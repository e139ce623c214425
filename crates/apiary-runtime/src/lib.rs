//! # Apiary Runtime
//!
//! Serves validated contracts: a lock-free [`ServiceRegistry`] holding the
//! routing table and live service instances, the peer and user
//! authenticator chains, parameter binding, and the [`RequestDispatcher`]
//! that ties them together.
//!
//! ## Example
//!
//! ```
//! use apiary_config::DispatchConfig;
//! use apiary_contract::ContractBuilder;
//! use apiary_core::fixtures::{self, GreetingStore};
//! use apiary_runtime::{AuthenticatorSet, DispatchContext, RequestDispatcher, ServiceRegistry};
//! use http::{HeaderMap, Method, StatusCode};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let contracts = ContractBuilder::new(fixtures::greeting_index())
//!     .service("GreetingService")
//!     .build()
//!     .unwrap();
//!
//! let registry = Arc::new(ServiceRegistry::new("/_api"));
//! registry
//!     .register(
//!         contracts.get("greetings", "v1").unwrap(),
//!         "GreetingService",
//!         Arc::new(GreetingStore::default()),
//!     )
//!     .unwrap();
//!
//! let dispatcher = RequestDispatcher::new(registry, AuthenticatorSet::new(), DispatchConfig::default());
//! let mut ctx = DispatchContext::new(HeaderMap::new(), r#"{"message":"hi"}"#);
//! assert!(dispatcher.dispatch(&Method::POST, "/_api/greetings/v1/greeting/insert", &mut ctx).await);
//! assert_eq!(ctx.response().unwrap().status, StatusCode::OK);
//! # });
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
mod binding;
mod dispatcher;
mod error;
mod registry;
mod request;

pub use auth::{
    ApiKeyAuthenticator, AuthenticationContext, Authenticator, AuthenticatorSet,
    BearerTokenAuthenticator, FnAuthenticator, FnPeerAuthenticator, PeerAuthenticator,
    SpiffePeerAuthenticator,
};
pub use binding::{bind_arguments, BindingInput};
pub use dispatcher::RequestDispatcher;
pub use error::RegistryError;
pub use registry::{mount_path, Registration, RegistrySnapshot, RouteTarget, ServiceRegistry};
pub use request::{ApiResponse, DispatchContext, DispatchState, REQUEST_ID_HEADER};
