//! Radix tree routing table for Apiary.
//!
//! The dispatcher's routing table is built once from a validated contract:
//! every method contributes one `(verb, path template)` route whose target is
//! the method's canonical name. Matching costs O(k) in the number of path
//! segments.
//!
//! # Features
//!
//! - **Placeholders**: `{name}` segments match any single segment
//! - **Literal priority**: the longest literal prefix wins
//! - **Shape conflicts**: two templates with the same verb and shape are rejected at insert
//!
//! # Example
//!
//! ```rust
//! use apiary_router::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert(Method::GET, "/greeting/list", "greetings.greeting.list").unwrap();
//! router.insert(Method::GET, "/greeting/{id}", "greetings.greeting.get").unwrap();
//!
//! let found = router.match_route(&Method::GET, "/greeting/list").unwrap();
//! assert_eq!(found.target, "greetings.greeting.list");
//!
//! let found = router.match_route(&Method::GET, "/greeting/42").unwrap();
//! assert_eq!(found.params.get("id"), Some("42"));
//! ```
//!
//! # Architecture
//!
//! ```text
//!              (root)
//!                │
//!            "greeting"
//!                │
//!        ┌───────┴───────┐
//!        │               │
//!      "list"           {}
//!      [GET]        [GET, DELETE]
//! ```

mod error;
mod method_router;
mod node;
mod params;
mod router;

pub use error::RouteError;
pub use method_router::{MethodEntry, MethodRouter};
pub use node::{Node, SegmentKind};
pub use params::Params;
pub use router::{path_shape, Router};

/// A matched route with its target and extracted parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// The target registered for the route
    pub target: &'a str,
    /// Extracted path parameters
    pub params: Params,
}

impl<'a> RouteMatch<'a> {
    /// Creates a new route match.
    #[must_use]
    pub fn new(target: &'a str, params: Params) -> Self {
        Self { target, params }
    }
}
