//! Value transformers.
//!
//! A [`Transformer`] converts a domain type to another wire type and back.
//! Transformers compose into a [`TransformerChain`]: the schema describes
//! the chain's final type, outbound values run the chain forwards and
//! inbound values run it backwards.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use apiary_core::{ClassIndex, TypeRef};

/// A value conversion between wire representations.
pub type Conversion = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Errors raised while building a transformer chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// No transformer is registered under the name.
    #[error("unknown transformer '{name}'")]
    Unknown {
        /// Requested name.
        name: String,
    },

    /// The transformer does not accept the type produced by the previous step.
    #[error("transformer '{name}' converts '{expected}', not '{found}'")]
    Mismatch {
        /// Transformer name.
        name: String,
        /// Its source type.
        expected: String,
        /// Type actually reaching it.
        found: String,
    },

    /// The chain returns to a type it already passed through.
    #[error("transformer chain loops back to '{ty}'")]
    Cycle {
        /// Repeated type.
        ty: String,
    },
}

/// A named, bidirectional type conversion.
#[derive(Clone)]
pub struct Transformer {
    /// Registry name.
    pub name: String,
    /// Domain-side type.
    pub source: TypeRef,
    /// Wire-side type.
    pub target: TypeRef,
    to_wire: Conversion,
    from_wire: Conversion,
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Transformer {
    /// Creates a transformer from `source` to `target`.
    pub fn new<F, G>(
        name: impl Into<String>,
        source: TypeRef,
        target: TypeRef,
        to_wire: F,
        from_wire: G,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
        G: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source,
            target,
            to_wire: Arc::new(to_wire),
            from_wire: Arc::new(from_wire),
        }
    }

    fn accepts(&self, ty: &TypeRef) -> bool {
        self.source.erasure() == ty.erasure()
    }
}

/// An ordered, validated sequence of transformers.
#[derive(Clone, Default)]
pub struct TransformerChain {
    steps: Vec<Transformer>,
}

impl fmt::Debug for TransformerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl PartialEq for TransformerChain {
    fn eq(&self, other: &Self) -> bool {
        self.names().eq(other.names())
    }
}

impl Serialize for TransformerChain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.steps.len()))?;
        for name in self.names() {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

impl TransformerChain {
    /// The empty chain.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` when no transformer applies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Step names in forward order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|t| t.name.as_str())
    }

    /// Type on the wire after the chain, or `ty` itself for the empty chain.
    #[must_use]
    pub fn wire_type<'a>(&'a self, ty: &'a TypeRef) -> &'a TypeRef {
        self.steps.last().map_or(ty, |t| &t.target)
    }

    /// Converts a domain value for the wire.
    pub fn to_wire(&self, value: Value) -> Result<Value, String> {
        self.steps
            .iter()
            .try_fold(value, |v, step| (step.to_wire)(v))
    }

    /// Converts a wire value back to the domain type.
    pub fn from_wire(&self, value: Value) -> Result<Value, String> {
        self.steps
            .iter()
            .rev()
            .try_fold(value, |v, step| (step.from_wire)(v))
    }
}

/// Named transformers plus per-type defaults.
#[derive(Debug, Clone, Default)]
pub struct TransformerRegistry {
    by_name: HashMap<String, Transformer>,
    defaults: HashMap<String, String>,
}

impl TransformerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transformer usable by name.
    pub fn register(&mut self, transformer: Transformer) {
        self.by_name.insert(transformer.name.clone(), transformer);
    }

    /// Registers a transformer and makes it the default for its source type.
    pub fn register_default(&mut self, transformer: Transformer) {
        self.defaults
            .insert(transformer.source.erasure(), transformer.name.clone());
        self.register(transformer);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, transformer: Transformer) -> Self {
        self.register(transformer);
        self
    }

    /// Builder-style [`register_default`](Self::register_default).
    #[must_use]
    pub fn with_default(mut self, transformer: Transformer) -> Self {
        self.register_default(transformer);
        self
    }

    /// Looks a transformer up.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Transformer> {
        self.by_name.get(name)
    }

    fn implicit_for(&self, ty: &TypeRef, classes: &ClassIndex) -> Option<String> {
        ty.class_name()
            .and_then(|name| classes.get(name))
            .and_then(|class| class.transformer.clone())
            .or_else(|| self.defaults.get(&ty.erasure()).cloned())
    }

    /// Builds the chain for `ty`.
    ///
    /// An explicit list is used exactly as given. Otherwise each type's own
    /// transformer (from its class declaration or the registry defaults) is
    /// followed until a type without one is reached.
    pub fn resolve_chain(
        &self,
        ty: &TypeRef,
        explicit: &[String],
        classes: &ClassIndex,
    ) -> Result<TransformerChain, TransformError> {
        let mut builder = ChainBuilder::new(ty);
        if explicit.is_empty() {
            while let Some(name) = self.implicit_for(&builder.current, classes) {
                builder.push(self, &name)?;
            }
        } else {
            for name in explicit {
                builder.push(self, name)?;
            }
        }
        Ok(TransformerChain {
            steps: builder.steps,
        })
    }
}

struct ChainBuilder {
    steps: Vec<Transformer>,
    seen: HashSet<String>,
    current: TypeRef,
}

impl ChainBuilder {
    fn new(ty: &TypeRef) -> Self {
        Self {
            steps: Vec::new(),
            seen: HashSet::from([ty.erasure()]),
            current: ty.clone(),
        }
    }

    fn push(&mut self, registry: &TransformerRegistry, name: &str) -> Result<(), TransformError> {
        let step = registry.get(name).ok_or_else(|| TransformError::Unknown {
            name: name.to_string(),
        })?;
        if !step.accepts(&self.current) {
            return Err(TransformError::Mismatch {
                name: name.to_string(),
                expected: step.source.to_string(),
                found: self.current.to_string(),
            });
        }
        if !self.seen.insert(step.target.erasure()) {
            return Err(TransformError::Cycle {
                ty: step.target.to_string(),
            });
        }
        self.current = step.target.clone();
        self.steps.push(step.clone());
        Ok(())
    }
}
