//! Routing table errors.

use http::Method;
use thiserror::Error;

/// Failure to add a route.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The template is malformed.
    #[error("invalid path template '{template}': {reason}")]
    InvalidTemplate {
        /// The offending template.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Another target already owns this verb and path shape.
    #[error("{method} {shape} is already routed to '{existing}' (via '{existing_template}')")]
    Conflict {
        /// HTTP verb.
        method: Method,
        /// Normalized path shape.
        shape: String,
        /// Target already registered.
        existing: String,
        /// Template already registered.
        existing_template: String,
    },
}
