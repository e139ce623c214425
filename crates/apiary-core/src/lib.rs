//! # Apiary Core
//!
//! Core types for the Apiary contract engine and dispatch runtime.
//!
//! This crate provides the foundational types used throughout Apiary:
//!
//! - [`TypeRef`], [`ClassDef`], [`MethodDef`], [`ClassIndex`] - The class model services are described with
//! - [`TypeCatalog`] - Wire type/format tables and scalar coercion
//! - [`ApiFragment`], [`ClassFragment`], [`MethodFragment`], [`ParameterFragment`] - Partial configuration layers
//! - [`ContractError`] - Build-time failures
//! - [`ServiceFault`], [`InvocationError`] - Request-time failures and their wire envelope
//! - [`Invoker`], [`Arguments`] - Type-erased method invocation
//! - [`Identity`], [`RequestId`] - Per-request caller and correlation data

#![doc(html_root_url = "https://docs.rs/apiary-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod catalog;
mod class;
mod context;
mod error;
pub mod fixtures;
pub mod fragment;
mod identity;
mod invoke;
mod types;

pub use catalog::{InjectedKind, ScalarKind, TypeCatalog, WireType};
pub use class::{ClassDef, ClassIndex, ClassKind, MethodDef, MethodRef, ParamDef, PropertyDef, Visibility};
pub use context::RequestId;
pub use error::{
    ContractError, ContractErrorKind, ContractErrors, ErrorCategory, ErrorDetail, ErrorEnvelope,
    InvocationError, ServiceFault, ServiceResult,
};
pub use fragment::{
    ApiFragment, AuthLevel, CacheControl, ClassFragment, FrontendLimitRule, FrontendLimits,
    MethodFragment, Namespace, ParameterFragment,
};
pub use identity::Identity;
pub use invoke::{Arguments, InvokeFuture, Invoker, ServiceInstance};
pub use types::{Primitive, TypeRef, WildcardBound, ROOT_CLASS};
