//! Radix tree node implementation.
//!
//! Each node is one path segment. Static children are kept sorted for
//! binary search; all placeholders at one depth share a single parameter
//! child, because placeholder names do not take part in matching.

use http::Method;

use crate::error::RouteError;
use crate::method_router::{MethodEntry, MethodRouter};

/// Type of path segment in the radix tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal segment (e.g., "greetings", "v1")
    Static,
    /// Placeholder (e.g., "{id}") carrying its name
    Param(String),
}

/// A node in the radix tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// The literal segment, or `{}` for the parameter child
    pub segment: String,

    /// Verb table when a template ends here
    pub methods: Option<MethodRouter>,

    /// Static children, sorted by segment for binary search
    pub static_children: Vec<Node>,

    /// Parameter child (at most one per node)
    pub param_child: Option<Box<Node>>,
}

impl Node {
    fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            methods: None,
            static_children: Vec::new(),
            param_child: None,
        }
    }

    /// Creates a root node for the tree.
    #[must_use]
    pub fn root() -> Self {
        Self::new("")
    }

    /// Parses a template into segments.
    ///
    /// Placeholders must occupy a whole segment and carry a non-empty name
    /// of letters, digits, `_`, `.` or `-`.
    pub fn parse_path(path: &str) -> Result<Vec<(String, SegmentKind)>, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidTemplate {
            template: path.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        for s in path.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-'));
                if !valid {
                    return Err(invalid("placeholder names must be non-empty identifiers"));
                }
                segments.push((s.to_string(), SegmentKind::Param(name.to_string())));
            } else if s.contains(['{', '}']) {
                return Err(invalid("placeholders must span a whole segment"));
            } else {
                segments.push((s.to_string(), SegmentKind::Static));
            }
        }
        Ok(segments)
    }

    /// Returns the endpoint node for `segments`, creating nodes as needed.
    pub(crate) fn endpoint_mut(&mut self, segments: &[(String, SegmentKind)]) -> &mut Node {
        let Some(((segment, kind), remaining)) = segments.split_first() else {
            return self;
        };

        let child = match kind {
            SegmentKind::Static => {
                let index = match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(index) => index,
                    Err(index) => {
                        self.static_children.insert(index, Node::new(segment.as_str()));
                        index
                    }
                };
                &mut self.static_children[index]
            }
            SegmentKind::Param(_) => self
                .param_child
                .get_or_insert_with(|| Box::new(Node::new("{}")))
                .as_mut(),
        };
        child.endpoint_mut(remaining)
    }

    /// Matches a verb and concrete path, collecting placeholder values in
    /// order.
    ///
    /// Static children are tried first; when a static branch dead-ends, or
    /// ends at a node without this verb, the parameter branch is tried with
    /// the collected values rolled back.
    #[must_use]
    pub fn match_path<'p>(
        &self,
        method: &Method,
        path: &'p str,
    ) -> Option<(&MethodEntry, Vec<&'p str>)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut values = Vec::new();
        let entry = self.match_segments(method, &segments, &mut values)?;
        Some((entry, values))
    }

    fn match_segments<'p>(
        &self,
        method: &Method,
        segments: &[&'p str],
        values: &mut Vec<&'p str>,
    ) -> Option<&MethodEntry> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.methods.as_ref().and_then(|m| m.get(method));
        };

        if let Some(child) = self.find_static_child(segment) {
            if let Some(found) = child.match_segments(method, remaining, values) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            let mark = values.len();
            values.push(*segment);
            if let Some(found) = child.match_segments(method, remaining, values) {
                return Some(found);
            }
            values.truncate(mark);
        }

        None
    }

    /// Finds a static child by segment using binary search.
    fn find_static_child(&self, segment: &str) -> Option<&Node> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}
