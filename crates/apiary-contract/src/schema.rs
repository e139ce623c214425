//! Resource schemas.
//!
//! [`SchemaRepository`] derives JSON-schema-like descriptors for resolved
//! types. Object and enum types are registered once under an id and
//! referenced with `$ref` everywhere else, which is also how
//! self-referential types terminate: the id is reserved before the
//! properties are visited.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use apiary_core::{ClassIndex, ScalarKind, TypeCatalog, TypeRef, WireType};

use crate::resolver::{substitute, MethodSignatureResolver};
use crate::transform::{TransformError, TransformerChain, TransformerRegistry};

/// A schema node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schema {
    /// A single wire value.
    Scalar {
        /// Wire type and format.
        #[serde(flatten)]
        wire: WireType,
    },
    /// Any JSON value.
    Any,
    /// Reference to a registered [`SchemaType`].
    Ref {
        /// Registered id.
        #[serde(rename = "$ref")]
        id: String,
    },
    /// Array or collection.
    Array {
        /// Element schema.
        items: Box<Schema>,
        /// Levels of repetition, 1 for a flat array.
        depth: usize,
    },
    /// String-keyed map.
    Map {
        /// Value schema.
        values: Box<Schema>,
    },
}

impl Schema {
    /// The referenced id, if this is a `$ref`.
    #[must_use]
    pub fn ref_id(&self) -> Option<&str> {
        match self {
            Self::Ref { id } => Some(id),
            _ => None,
        }
    }
}

/// Body of a registered type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaBody {
    /// Object with named properties.
    Object {
        /// Properties in declaration order, inherited ones first.
        properties: IndexMap<String, Schema>,
    },
    /// String enumeration.
    Enum {
        /// Enumerated literals.
        values: Vec<String>,
    },
}

/// A registered schema type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaType {
    /// Schema id.
    pub id: String,
    /// Contents.
    #[serde(flatten)]
    pub body: SchemaBody,
}

/// Schema resolution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A wildcard reached schema resolution.
    #[error("unsupported wildcard in '{ty}'")]
    UnsupportedWildcard {
        /// Offending type.
        ty: String,
    },

    /// The type has no wire representation.
    #[error("'{ty}' has no schema representation")]
    Unrepresentable {
        /// Offending type.
        ty: String,
    },

    /// A property's transformer chain is invalid.
    #[error(transparent)]
    Transformer(#[from] TransformError),
}

/// Schema id of a type, including its type arguments (`Page_String`).
#[must_use]
pub fn schema_id(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Class { name, args } if !args.is_empty() => {
            let args: Vec<String> = args.iter().map(schema_id).collect();
            format!("{name}_{}", args.join("_"))
        }
        TypeRef::Array { element } => format!("{}Array", schema_id(element)),
        other => other.erasure(),
    }
}

/// Memoizing schema resolver, owned by one contract build.
#[derive(Debug)]
pub struct SchemaRepository<'a> {
    classes: &'a ClassIndex,
    catalog: &'a TypeCatalog,
    transformers: &'a TransformerRegistry,
    resolver: MethodSignatureResolver<'a>,
    cache: HashMap<(TypeRef, Vec<String>), Schema>,
    types: IndexMap<String, SchemaType>,
}

impl<'a> SchemaRepository<'a> {
    /// Creates an empty repository.
    #[must_use]
    pub fn new(
        classes: &'a ClassIndex,
        catalog: &'a TypeCatalog,
        transformers: &'a TransformerRegistry,
    ) -> Self {
        Self {
            classes,
            catalog,
            transformers,
            resolver: MethodSignatureResolver::new(classes),
            cache: HashMap::new(),
            types: IndexMap::new(),
        }
    }

    /// Resolves `ty` after applying `chain`.
    ///
    /// Results are memoized per `(type, chain)` pair, so repeated calls
    /// return equal schemas.
    ///
    /// # Example
    ///
    /// ```
    /// use apiary_contract::{Schema, SchemaRepository, TransformerChain, TransformerRegistry};
    /// use apiary_core::{fixtures, ClassIndex, TypeCatalog, TypeRef};
    ///
    /// let classes = ClassIndex::new().with(fixtures::node_class());
    /// let catalog = TypeCatalog::new();
    /// let transformers = TransformerRegistry::new();
    /// let mut repo = SchemaRepository::new(&classes, &catalog, &transformers);
    ///
    /// let node = repo.resolve(&TypeRef::class("Node"), &TransformerChain::empty()).unwrap();
    /// assert_eq!(node.ref_id(), Some("Node"));
    /// assert!(repo.get("Node").is_some());
    /// ```
    pub fn resolve(&mut self, ty: &TypeRef, chain: &TransformerChain) -> Result<Schema, SchemaError> {
        let key = (ty.clone(), chain.names().map(String::from).collect::<Vec<_>>());
        if let Some(schema) = self.cache.get(&key) {
            return Ok(schema.clone());
        }
        let schema = self.resolve_wire(chain.wire_type(ty))?;
        self.cache.insert(key, schema.clone());
        Ok(schema)
    }

    /// Resolves `ty` with its implicit transformer chain.
    pub fn resolve_type(&mut self, ty: &TypeRef) -> Result<Schema, SchemaError> {
        let chain = self.transformers.resolve_chain(ty, &[], self.classes)?;
        self.resolve(ty, &chain)
    }

    fn resolve_wire(&mut self, ty: &TypeRef) -> Result<Schema, SchemaError> {
        if ty.find_wildcard().is_some() {
            return Err(SchemaError::UnsupportedWildcard { ty: ty.to_string() });
        }
        if matches!(ty, TypeRef::Var { .. }) || self.catalog.is_any(ty) {
            return Ok(Schema::Any);
        }

        match self.catalog.scalar_kind(ty, self.classes) {
            Some(ScalarKind::Enum(values)) => {
                let id = schema_id(ty);
                self.types.entry(id.clone()).or_insert_with(|| SchemaType {
                    id: id.clone(),
                    body: SchemaBody::Enum { values },
                });
                return Ok(Schema::Ref { id });
            }
            Some(kind) => {
                return Ok(Schema::Scalar {
                    wire: kind.schema_type(),
                })
            }
            None => {}
        }

        if let Some(element) = self.catalog.repeated_element(ty) {
            let items = self.resolve_type(element)?;
            let depth = match &items {
                Schema::Array { depth, .. } => depth + 1,
                _ => 1,
            };
            return Ok(Schema::Array {
                items: Box::new(items),
                depth,
            });
        }

        if self.catalog.is_map(ty) {
            let values = match ty.type_args().get(1) {
                Some(value_ty) => self.resolve_type(value_ty)?,
                None => Schema::Any,
            };
            return Ok(Schema::Map {
                values: Box::new(values),
            });
        }

        self.resolve_object(ty)
    }

    fn resolve_object(&mut self, ty: &TypeRef) -> Result<Schema, SchemaError> {
        let unrepresentable = || SchemaError::Unrepresentable { ty: ty.to_string() };
        let class = ty
            .class_name()
            .and_then(|name| self.classes.get(name))
            .cloned()
            .ok_or_else(unrepresentable)?;

        let id = schema_id(ty);
        if self.types.contains_key(&id) {
            return Ok(Schema::Ref { id });
        }
        self.types.insert(
            id.clone(),
            SchemaType {
                id: id.clone(),
                body: SchemaBody::Object {
                    properties: IndexMap::new(),
                },
            },
        );

        match self.object_properties(ty, &class.name) {
            Ok(properties) => {
                if let Some(entry) = self.types.get_mut(&id) {
                    entry.body = SchemaBody::Object { properties };
                }
                Ok(Schema::Ref { id })
            }
            Err(e) => {
                self.types.shift_remove(&id);
                Err(e)
            }
        }
    }

    fn object_properties(
        &mut self,
        ty: &TypeRef,
        name: &str,
    ) -> Result<IndexMap<String, Schema>, SchemaError> {
        let lineage = self.classes.superclass_chain(name);
        let Some(leaf) = lineage.first().cloned() else {
            return Ok(IndexMap::new());
        };
        let leaf_bindings = self.resolver.instance_bindings(ty);

        let mut properties = IndexMap::new();
        for class in lineage.iter().rev() {
            let bindings = self
                .resolver
                .bindings_along(&leaf, leaf_bindings.clone(), &class.name)
                .map_err(|_| SchemaError::Unrepresentable { ty: ty.to_string() })?;
            for property in class.properties.iter().filter(|p| p.readable && !p.ignored) {
                let property_ty = substitute(&property.ty, &bindings);
                let schema = self.resolve_type(&property_ty)?;
                properties.insert(property.schema_name().to_string(), schema);
            }
        }
        Ok(properties)
    }

    /// A registered type by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SchemaType> {
        self.types.get(id)
    }

    /// Every registered type, in registration order.
    #[must_use]
    pub fn types(&self) -> &IndexMap<String, SchemaType> {
        &self.types
    }

    /// Consumes the repository, returning the registered types.
    #[must_use]
    pub fn into_types(self) -> IndexMap<String, SchemaType> {
        self.types
    }
}
