//! Class model supplied to the contract engine.
//!
//! Service classes, their ancestors and every resource type they mention are
//! described as plain data and collected in a [`ClassIndex`]. Downstream
//! components resolve types against the index once and never walk source
//! declarations again.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::fragment::{ApiFragment, ClassFragment, MethodFragment, ParameterFragment};
use crate::invoke::Invoker;
use crate::types::{TypeRef, ROOT_CLASS};

/// The structural kind of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassKind {
    /// Instantiable class.
    Concrete,
    /// Abstract class, never a service on its own.
    Abstract,
    /// Interface.
    Interface,
    /// Enumeration with its constants in declaration order.
    Enum {
        /// Enumerated constants.
        constants: Vec<String>,
    },
}

/// Method visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Callable from anywhere.
    #[default]
    Public,
    /// Anything narrower than public.
    Restricted,
}

/// A declared method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    /// Source-level parameter name, when the reader could recover it.
    pub declared_name: Option<String>,
    /// Declared type.
    pub ty: TypeRef,
    /// Parameter configuration.
    pub config: ParameterFragment,
}

impl ParamDef {
    /// Creates a parameter with no configuration.
    #[must_use]
    pub fn new(ty: TypeRef) -> Self {
        Self {
            declared_name: None,
            ty,
            config: ParameterFragment::default(),
        }
    }

    /// Creates a parameter bound to a wire name.
    #[must_use]
    pub fn named(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            declared_name: None,
            ty,
            config: ParameterFragment::named(name),
        }
    }

    /// Replaces the parameter configuration.
    #[must_use]
    pub fn with_config(mut self, config: ParameterFragment) -> Self {
        self.config = config;
        self
    }

    /// Sets the source-level name.
    #[must_use]
    pub fn declared(mut self, name: impl Into<String>) -> Self {
        self.declared_name = Some(name.into());
        self
    }
}

/// A declared method.
#[derive(Clone)]
pub struct MethodDef {
    /// Source method name.
    pub name: String,
    /// Parameters in order.
    pub params: Vec<ParamDef>,
    /// Declared return type.
    pub returns: TypeRef,
    /// Visibility.
    pub visibility: Visibility,
    /// Static methods are never API methods.
    pub is_static: bool,
    /// Compiler-synthesized bridge or erasure thunk.
    pub is_bridge: bool,
    /// Method configuration.
    pub config: MethodFragment,
    /// Callable bound to this declaration.
    pub invoker: Option<Invoker>,
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("visibility", &self.visibility)
            .field("is_static", &self.is_static)
            .field("is_bridge", &self.is_bridge)
            .field("config", &self.config)
            .field("invoker", &self.invoker.is_some())
            .finish()
    }
}

impl MethodDef {
    /// Creates a public, non-static method returning `void`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: TypeRef::Void,
            visibility: Visibility::Public,
            is_static: false,
            is_bridge: false,
            config: MethodFragment::default(),
            invoker: None,
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.returns = ty;
        self
    }

    /// Sets the method configuration.
    #[must_use]
    pub fn with_config(mut self, config: MethodFragment) -> Self {
        self.config = config;
        self
    }

    /// Binds the callable.
    #[must_use]
    pub fn invoker(mut self, invoker: Invoker) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Marks the method static.
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Marks the method as a synthesized bridge.
    #[must_use]
    pub fn bridge(mut self) -> Self {
        self.is_bridge = true;
        self
    }

    /// Restricts visibility.
    #[must_use]
    pub fn restricted(mut self) -> Self {
        self.visibility = Visibility::Restricted;
        self
    }

    /// Public, non-static and not a bridge.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.visibility == Visibility::Public && !self.is_static && !self.is_bridge
    }
}

/// A readable/writable property of a resource class.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    /// Property name as exposed by its accessor.
    pub name: String,
    /// Declared type.
    pub ty: TypeRef,
    /// A getter exists.
    pub readable: bool,
    /// A setter exists.
    pub writable: bool,
    /// Explicitly excluded from the schema.
    pub ignored: bool,
    /// Wire name override.
    pub wire_name: Option<String>,
}

impl PropertyDef {
    /// Creates a property with both accessors.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            readable: true,
            writable: true,
            ignored: false,
            wire_name: None,
        }
    }

    /// Removes the setter.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Excludes the property.
    #[must_use]
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    /// Renames the property on the wire.
    #[must_use]
    pub fn renamed(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = Some(wire_name.into());
        self
    }

    /// Name used in the schema.
    #[must_use]
    pub fn schema_name(&self) -> &str {
        self.wire_name.as_deref().unwrap_or(&self.name)
    }
}

/// A class declaration.
///
/// # Example
///
/// ```
/// use apiary_core::{ClassDef, MethodDef, ParamDef, Primitive, TypeRef};
///
/// let base = ClassDef::abstract_class("Base")
///     .type_param("T")
///     .method(
///         MethodDef::new("get")
///             .param(ParamDef::named("id", TypeRef::primitive(Primitive::Long)))
///             .returns(TypeRef::var("T")),
///     );
/// let leaf = ClassDef::concrete("Leaf")
///     .extends(TypeRef::generic("Base", vec![TypeRef::class("String")]));
///
/// assert_eq!(base.type_params, vec!["T".to_string()]);
/// assert_eq!(leaf.superclass_name(), Some("Base"));
/// ```
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Fully-qualified name.
    pub name: String,
    /// Declared type parameters.
    pub type_params: Vec<String>,
    /// Parameterized superclass reference.
    pub superclass: Option<TypeRef>,
    /// Implemented interfaces.
    pub interfaces: Vec<TypeRef>,
    /// Structural kind.
    pub kind: ClassKind,
    /// Declared methods.
    pub methods: Vec<MethodDef>,
    /// Resource properties.
    pub properties: Vec<PropertyDef>,
    /// API-level configuration.
    pub api: Option<ApiFragment>,
    /// Class-level configuration.
    pub config: ClassFragment,
    /// Transformer applied to this type wherever it appears.
    pub transformer: Option<String>,
}

impl ClassDef {
    fn with_kind(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            kind,
            methods: Vec::new(),
            properties: Vec::new(),
            api: None,
            config: ClassFragment::default(),
            transformer: None,
        }
    }

    /// Creates an instantiable class.
    #[must_use]
    pub fn concrete(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Concrete)
    }

    /// Creates an abstract class.
    #[must_use]
    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Abstract)
    }

    /// Creates an interface.
    #[must_use]
    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Interface)
    }

    /// Creates an enumeration.
    #[must_use]
    pub fn enumeration<I, S>(name: impl Into<String>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(
            name,
            ClassKind::Enum {
                constants: constants.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Declares a type parameter.
    #[must_use]
    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }

    /// Sets the superclass.
    #[must_use]
    pub fn extends(mut self, superclass: TypeRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Adds an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Sets the API-level configuration.
    #[must_use]
    pub fn api(mut self, api: ApiFragment) -> Self {
        self.api = Some(api);
        self
    }

    /// Sets the class-level configuration.
    #[must_use]
    pub fn with_config(mut self, config: ClassFragment) -> Self {
        self.config = config;
        self
    }

    /// Sets the type's default transformer.
    #[must_use]
    pub fn transformed_by(mut self, transformer: impl Into<String>) -> Self {
        self.transformer = Some(transformer.into());
        self
    }

    /// Name of the superclass, if any.
    #[must_use]
    pub fn superclass_name(&self) -> Option<&str> {
        self.superclass.as_ref().and_then(TypeRef::class_name)
    }

    /// Returns `true` for concrete classes.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        self.kind == ClassKind::Concrete
    }

    /// Enum constants, if this is an enumeration.
    #[must_use]
    pub fn enum_constants(&self) -> Option<&[String]> {
        match &self.kind {
            ClassKind::Enum { constants } => Some(constants),
            _ => None,
        }
    }
}

/// Identifies a method declaration in error messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Declaring (or leaf) class.
    pub class: String,
    /// Method name.
    pub method: String,
    /// Erased parameter types.
    pub params: Vec<String>,
}

impl MethodRef {
    /// Creates a method reference.
    #[must_use]
    pub fn new(class: impl Into<String>, method: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            params,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.class, self.method, self.params.join(", "))
    }
}

/// Arena of class declarations, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    classes: IndexMap<String, Arc<ClassDef>>,
}

impl ClassIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a class.
    pub fn insert(&mut self, class: ClassDef) -> Arc<ClassDef> {
        let class = Arc::new(class);
        self.classes.insert(class.name.clone(), Arc::clone(&class));
        class
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, class: ClassDef) -> Self {
        self.insert(class);
        self
    }

    /// Looks a class up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ClassDef>> {
        self.classes.get(name)
    }

    /// Returns `true` if the class is known.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterates the classes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClassDef>> {
        self.classes.values()
    }

    /// Superclass chain of `name`, most-derived first, excluding the root.
    ///
    /// The walk stops at the first class missing from the index.
    #[must_use]
    pub fn superclass_chain(&self, name: &str) -> Vec<Arc<ClassDef>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.get(name).cloned();
        while let Some(class) = current {
            if class.name == ROOT_CLASS || !seen.insert(class.name.clone()) {
                break;
            }
            current = class.superclass_name().and_then(|s| self.get(s)).cloned();
            chain.push(class);
        }
        chain
    }

    /// Returns `true` if `sub` is `sup` or inherits from it through
    /// superclasses or interfaces.
    #[must_use]
    pub fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        if sub == sup || sup == ROOT_CLASS {
            return true;
        }
        let mut pending = vec![sub.to_string()];
        let mut seen = HashSet::new();
        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let Some(class) = self.get(&name) else {
                continue;
            };
            for parent in class.superclass.iter().chain(class.interfaces.iter()) {
                if let Some(parent_name) = parent.class_name() {
                    if parent_name == sup {
                        return true;
                    }
                    pending.push(parent_name.to_string());
                }
            }
        }
        false
    }

    /// Ordinary assignability of resolved types, ignoring type arguments.
    #[must_use]
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        match (from, to) {
            _ if from == to => true,
            (_, TypeRef::Var { .. }) => true,
            (TypeRef::Class { .. } | TypeRef::Array { .. } | TypeRef::Var { .. }, TypeRef::Class { name, .. })
                if name == ROOT_CLASS =>
            {
                true
            }
            (TypeRef::Class { name: sub, .. }, TypeRef::Class { name: sup, .. }) => {
                self.is_subclass(sub, sup)
            }
            (TypeRef::Array { element: a }, TypeRef::Array { element: b }) => {
                self.is_assignable(a, b)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;

    fn index() -> ClassIndex {
        ClassIndex::new()
            .with(ClassDef::interface("Named"))
            .with(ClassDef::abstract_class("Animal").implements(TypeRef::class("Named")))
            .with(ClassDef::concrete("Dog").extends(TypeRef::class("Animal")))
            .with(ClassDef::concrete("Puppy").extends(TypeRef::class("Dog")))
    }

    #[test]
    fn test_superclass_chain_order() {
        let names: Vec<_> = index()
            .superclass_chain("Puppy")
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["Puppy", "Dog", "Animal"]);
    }

    #[test]
    fn test_is_subclass_through_interface() {
        let index = index();
        assert!(index.is_subclass("Puppy", "Named"));
        assert!(index.is_subclass("Dog", "Animal"));
        assert!(!index.is_subclass("Animal", "Dog"));
    }

    #[test]
    fn test_assignability() {
        let index = index();
        assert!(index.is_assignable(&TypeRef::class("Puppy"), &TypeRef::class("Animal")));
        assert!(!index.is_assignable(&TypeRef::class("Animal"), &TypeRef::class("Puppy")));
        assert!(index.is_assignable(&TypeRef::class("Dog"), &TypeRef::class(ROOT_CLASS)));
        assert!(!index.is_assignable(
            &TypeRef::primitive(Primitive::Int),
            &TypeRef::primitive(Primitive::Long)
        ));
    }

    #[test]
    fn test_method_eligibility() {
        assert!(MethodDef::new("get").is_eligible());
        assert!(!MethodDef::new("get").static_method().is_eligible());
        assert!(!MethodDef::new("get").bridge().is_eligible());
        assert!(!MethodDef::new("get").restricted().is_eligible());
    }

    #[test]
    fn test_method_ref_display() {
        let r = MethodRef::new("Leaf", "get", vec!["long".to_string()]);
        assert_eq!(r.to_string(), "Leaf.get(long)");
    }
}
