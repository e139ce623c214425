//! High-level router API.

use http::Method;

use crate::error::RouteError;
use crate::method_router::MethodEntry;
use crate::node::{Node, SegmentKind};
use crate::params::Params;
use crate::RouteMatch;

/// Normalizes a template to its shape: placeholders become `{}` and empty
/// segments are dropped.
///
/// Two templates with the same shape cannot be told apart by a request path.
///
/// ```rust
/// use apiary_router::path_shape;
///
/// assert_eq!(path_shape("/greetings/{id}/"), "greetings/{}");
/// assert_eq!(path_shape("greetings/{key}"), path_shape("greetings/{id}"));
/// ```
#[must_use]
pub fn path_shape(template: &str) -> String {
    template
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with('{') && s.ends_with('}') {
                "{}"
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// A radix tree routing table keyed by verb and path template.
///
/// # Example
///
/// ```rust
/// use apiary_router::Router;
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert(Method::GET, "/_api/greetings/v1/greeting/{id}", "greetings.greeting.get").unwrap();
/// router.insert(Method::DELETE, "/_api/greetings/v1/greeting/{id}", "greetings.greeting.remove").unwrap();
///
/// let found = router.match_route(&Method::GET, "/_api/greetings/v1/greeting/7").unwrap();
/// assert_eq!(found.target, "greetings.greeting.get");
/// assert_eq!(found.params.get("id"), Some("7"));
/// ```
///
/// # Route Priority
///
/// A literal segment beats a placeholder at the same depth, so the longest
/// literal prefix wins. If the literal branch has no route for the verb,
/// matching falls back to the placeholder branch.
#[derive(Debug, Clone)]
pub struct Router {
    /// Root node of the radix tree
    root: Node,
    /// Number of routes registered
    route_count: usize,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Routes `method` + `template` to `target`.
    ///
    /// Fails if the template is malformed or the verb is already routed for
    /// a template of the same shape.
    pub fn insert(
        &mut self,
        method: Method,
        template: &str,
        target: impl Into<String>,
    ) -> Result<(), RouteError> {
        let segments = Node::parse_path(template)?;
        let param_names: Vec<String> = segments
            .iter()
            .filter_map(|(_, kind)| match kind {
                SegmentKind::Param(name) => Some(name.clone()),
                SegmentKind::Static => None,
            })
            .collect();

        let endpoint = self.root.endpoint_mut(&segments);
        let methods = endpoint.methods.get_or_insert_with(Default::default);
        methods
            .insert(method.clone(), target, param_names, template)
            .map_err(|existing| RouteError::Conflict {
                method,
                shape: path_shape(template),
                existing: existing.target.clone(),
                existing_template: existing.template.clone(),
            })?;
        self.route_count += 1;
        Ok(())
    }

    /// Matches a verb and path.
    ///
    /// Placeholder values are percent-decoded.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let (entry, values) = self.root.match_path(method, path)?;
        let mut params: Params = entry
            .param_names
            .iter()
            .cloned()
            .zip(values.into_iter().map(ToString::to_string))
            .collect();
        params.decode();
        Some(RouteMatch::new(&entry.target, params))
    }

    /// Every registered entry, depth first.
    #[must_use]
    pub fn entries(&self) -> Vec<&MethodEntry> {
        let mut out = Vec::with_capacity(self.route_count);
        let mut pending = vec![&self.root];
        while let Some(node) = pending.pop() {
            if let Some(methods) = &node.methods {
                out.extend(methods.entries());
            }
            pending.extend(node.param_child.as_deref());
            pending.extend(node.static_children.iter().rev());
        }
        out
    }

    /// Returns the number of routes registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}
