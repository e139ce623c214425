//! # Apiary
//!
//! **Contract-first API endpoints from plain service classes.**
//!
//! Apiary reads a set of service classes (with generics, inheritance and
//! layered configuration), resolves them into canonical, versioned API
//! contracts, and serves those contracts with a dispatcher that routes,
//! authenticates, binds parameters, invokes and maps faults.
//!
//! - Generic-aware override and overload resolution across hierarchies
//! - REST path and verb inference with explicit overrides
//! - JSON schemas for every request and response type
//! - Contract validation that fails the whole build, never half of it
//! - Lock-free registry with atomic hot reload of one service
//! - Peer and user authenticator chains with per-call timeouts
//!
//! ## Quick Start
//!
//! ```
//! use apiary::prelude::*;
//! use apiary_core::fixtures::{self, GreetingStore};
//!
//! # tokio_test::block_on(async {
//! let apiary = Apiary::builder()
//!     .config(ApiaryConfig::default())
//!     .classes(fixtures::greeting_index())
//!     .service("GreetingService", GreetingStore::default())
//!     .authenticator(
//!         "keys",
//!         ApiKeyAuthenticator::new().with_key("secret", Identity::new("admin")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut ctx = DispatchContext::new(HeaderMap::new(), "");
//! apiary
//!     .dispatch(&Method::GET, "/_api/greetings/v1/greeting/list", &mut ctx)
//!     .await;
//! assert_eq!(ctx.response().unwrap().status, StatusCode::OK);
//! # });
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ClassIndex → HierarchyReader → MethodSignatureResolver → ConfigAssembler
//!                                                              ↓
//!            ServiceRegistry ← ApiContract ← ContractValidator ← SchemaRepository
//!                  ↓
//! Request → route → peer auth → user auth → bind → invoke → ApiResponse
//! ```

#![doc(html_root_url = "https://docs.rs/apiary/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;

pub use app::{Apiary, ApiaryBuilder};
pub use error::{ApiaryError, ApiaryResult};

// Re-export the member crates
pub use apiary_config as config;
pub use apiary_contract as contract;
pub use apiary_core as core;
pub use apiary_router as router;
pub use apiary_runtime as runtime;
pub use apiary_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use apiary::prelude::*;
///
/// let config = ApiaryConfig::default();
/// assert_eq!(config.dispatch.base_path, "/_api");
/// ```
pub mod prelude {
    pub use crate::{Apiary, ApiaryBuilder, ApiaryError, ApiaryResult};

    pub use apiary_config::{ApiaryConfig, ConfigLoader, DispatchConfig, IllegalArgumentPolicy};

    pub use apiary_contract::{
        ApiContract, BuildOptions, ContractBuilder, ContractSet, MethodConfig, ParameterConfig,
        Transformer, TransformerRegistry,
    };

    pub use apiary_core::{
        ApiFragment, Arguments, AuthLevel, ClassDef, ClassFragment, ClassIndex, ContractError,
        ContractErrors, Identity, InvocationError, Invoker, MethodDef, MethodFragment, ParamDef,
        ParameterFragment, Primitive, PropertyDef, RequestId, ServiceFault, ServiceInstance,
        ServiceResult, TypeCatalog, TypeRef,
    };

    pub use apiary_runtime::{
        ApiKeyAuthenticator, ApiResponse, AuthenticationContext, Authenticator,
        BearerTokenAuthenticator, DispatchContext, DispatchState, FnAuthenticator,
        FnPeerAuthenticator, PeerAuthenticator, RequestDispatcher, ServiceRegistry,
        SpiffePeerAuthenticator,
    };

    pub use http::{HeaderMap, Method, StatusCode};
}
