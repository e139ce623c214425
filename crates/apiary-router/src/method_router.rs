//! Per-path verb table.
//!
//! A [`MethodRouter`] lives on a route endpoint node and maps each HTTP verb
//! to its target and the placeholder names of the template that registered
//! it. Two templates with the same shape share one endpoint node, so names
//! are kept per verb rather than on the tree.

use http::Method;
use smallvec::SmallVec;

/// One verb registered at an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    /// HTTP verb.
    pub method: Method,
    /// Dispatch target, typically a canonical method name.
    pub target: String,
    /// Placeholder names in path order.
    pub param_names: Vec<String>,
    /// The template as registered.
    pub template: String,
}

/// Maps HTTP methods to targets for a single path shape.
///
/// # Example
///
/// ```rust
/// use apiary_router::MethodRouter;
/// use http::Method;
///
/// let mut methods = MethodRouter::new();
/// methods.insert(Method::GET, "greetings.get", vec!["id".into()], "get/{id}").unwrap();
///
/// assert_eq!(methods.target(&Method::GET), Some("greetings.get"));
/// assert!(methods.insert(Method::GET, "greetings.other", vec![], "get/{x}").is_err());
/// assert_eq!(methods.target(&Method::DELETE), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MethodRouter {
    entries: SmallVec<[MethodEntry; 2]>,
}

impl MethodRouter {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a verb. Fails with the existing entry when the verb is taken.
    pub fn insert(
        &mut self,
        method: Method,
        target: impl Into<String>,
        param_names: Vec<String>,
        template: impl Into<String>,
    ) -> Result<(), &MethodEntry> {
        if let Some(index) = self.entries.iter().position(|e| e.method == method) {
            return Err(&self.entries[index]);
        }
        self.entries.push(MethodEntry {
            method,
            target: target.into(),
            param_names,
            template: template.into(),
        });
        Ok(())
    }

    /// Entry for `method`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&MethodEntry> {
        self.entries.iter().find(|e| e.method == *method)
    }

    /// Target for `method`.
    #[must_use]
    pub fn target(&self, method: &Method) -> Option<&str> {
        self.get(method).map(|e| e.target.as_str())
    }

    /// Verbs registered at this endpoint.
    pub fn allowed_methods(&self) -> impl Iterator<Item = &Method> {
        self.entries.iter().map(|e| &e.method)
    }

    /// Every entry.
    pub fn entries(&self) -> impl Iterator<Item = &MethodEntry> {
        self.entries.iter()
    }

    /// Returns `true` if no verb is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_methods_are_supported() {
        let mut methods = MethodRouter::new();
        let purge = Method::from_bytes(b"PURGE").unwrap();
        methods.insert(purge.clone(), "cache.purge", vec![], "purge").unwrap();
        assert_eq!(methods.target(&purge), Some("cache.purge"));
    }

    #[test]
    fn test_conflict_reports_existing_entry() {
        let mut methods = MethodRouter::new();
        methods
            .insert(Method::PUT, "a.update", vec!["id".into()], "item/{id}")
            .unwrap();
        let existing = methods
            .insert(Method::PUT, "b.update", vec!["key".into()], "item/{key}")
            .unwrap_err();
        assert_eq!(existing.target, "a.update");
        assert_eq!(existing.template, "item/{id}");
    }

    #[test]
    fn test_allowed_methods() {
        let mut methods = MethodRouter::new();
        methods.insert(Method::GET, "get", vec![], "x").unwrap();
        methods.insert(Method::DELETE, "remove", vec![], "x").unwrap();
        let allowed: Vec<_> = methods.allowed_methods().cloned().collect();
        assert_eq!(allowed, vec![Method::GET, Method::DELETE]);
    }
}
