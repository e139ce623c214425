//! # Apiary Contract
//!
//! Build-time contract resolution. Service classes described with the
//! `apiary-core` class model go in; validated [`ApiContract`]s come out.
//!
//! The pipeline runs in one direction:
//!
//! 1. [`MethodSignatureResolver`] substitutes generic type arguments from a
//!    concrete leaf class down to each declaring class.
//! 2. [`HierarchyReader`] flattens a service class into [`OverrideChain`]s.
//! 3. [`ConfigAssembler`] merges configuration layers and produces one
//!    [`MethodConfig`] per chain, using [`SchemaRepository`] and the
//!    [`TransformerRegistry`] for request and response types.
//! 4. [`ContractValidator`] checks the assembled methods against each other.
//!
//! [`ContractBuilder`] drives the pipeline and collects every error.
//!
//! ```
//! use apiary_contract::ContractBuilder;
//! use apiary_core::fixtures;
//! use http::Method;
//!
//! let contracts = ContractBuilder::new(fixtures::greeting_index())
//!     .service("GreetingService")
//!     .build()
//!     .unwrap();
//! let remove = contracts
//!     .get("greetings", "v1")
//!     .and_then(|api| api.method("greetings.greeting.remove"))
//!     .unwrap();
//!
//! assert_eq!(remove.http_method, Method::DELETE);
//! assert_eq!(remove.path, "greeting/remove/{id}");
//! ```

#![doc(html_root_url = "https://docs.rs/apiary-contract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod assembler;
mod builder;
mod contract;
mod hierarchy;
mod merge;
mod resolver;
mod schema;
mod transform;
mod validator;

pub use assembler::ConfigAssembler;
pub use builder::{BuildOptions, ContractBuilder};
pub use contract::{
    ApiContract, ApiMetadata, ContractSet, MethodConfig, ParameterConfig, ParameterKind,
    ParameterLocation,
};
pub use hierarchy::{HierarchyReader, OverrideChain, ServiceHierarchy};
pub use merge::{merge_layers, merge_method, merge_parameter, MethodSettings, SettingsLayer};
pub use resolver::{substitute, Bindings, MethodSignatureResolver, ResolvedMethod, SignatureKey};
pub use schema::{schema_id, Schema, SchemaBody, SchemaError, SchemaRepository, SchemaType};
pub use transform::{
    Conversion, TransformError, Transformer, TransformerChain, TransformerRegistry,
};
pub use validator::{AssembledService, ContractValidator};
