//! Generic-aware method signature resolution.
//!
//! A method declared on `D` is resolved through a concrete leaf `C` by
//! substituting `C`'s type arguments along the superclass chain down to `D`.
//! The result carries concrete parameter and return types and the
//! [`SignatureKey`] used to group overrides.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use apiary_core::{
    ClassDef, ClassIndex, ContractError, MethodDef, MethodRef, TypeRef, WildcardBound, ROOT_CLASS,
};

/// Type variable bindings, variable name to resolved type.
pub type Bindings = HashMap<String, TypeRef>;

/// Method identity used for override grouping: name plus erased resolved
/// parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    /// Source method name.
    pub name: String,
    /// Erasures of the resolved parameter types.
    pub params: Vec<String>,
}

impl fmt::Display for SignatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// A method declaration with its signature resolved against a leaf class.
///
/// Equality compares signature keys only; use
/// [`same_declaration`](Self::same_declaration) for declaration identity.
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    /// Class that declares the method.
    pub declaring: Arc<ClassDef>,
    /// Position of the method in `declaring.methods`.
    pub index: usize,
    /// Resolved parameter types.
    pub params: Vec<TypeRef>,
    /// Resolved return type.
    pub returns: TypeRef,
    /// Grouping key.
    pub key: SignatureKey,
}

impl PartialEq for ResolvedMethod {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl ResolvedMethod {
    /// The underlying declaration.
    #[must_use]
    pub fn method(&self) -> &MethodDef {
        &self.declaring.methods[self.index]
    }

    /// Error-message reference to the declaration.
    #[must_use]
    pub fn method_ref(&self) -> MethodRef {
        MethodRef::new(
            self.declaring.name.clone(),
            self.key.name.clone(),
            self.key.params.clone(),
        )
    }

    /// `true` if both resolve the very same declaration.
    #[must_use]
    pub fn same_declaration(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.declaring, &other.declaring) && self.index == other.index
    }
}

/// Substitutes bound type variables throughout `ty`.
///
/// Unbound variables are left in place.
#[must_use]
pub fn substitute(ty: &TypeRef, bindings: &Bindings) -> TypeRef {
    match ty {
        TypeRef::Var { name } => bindings.get(name).cloned().unwrap_or_else(|| ty.clone()),
        TypeRef::Class { name, args } => TypeRef::Class {
            name: name.clone(),
            args: args.iter().map(|a| substitute(a, bindings)).collect(),
        },
        TypeRef::Array { element } => TypeRef::array(substitute(element, bindings)),
        TypeRef::Wildcard { bound } => TypeRef::Wildcard {
            bound: match bound {
                WildcardBound::Unbounded => WildcardBound::Unbounded,
                WildcardBound::Extends(t) => {
                    WildcardBound::Extends(Box::new(substitute(t, bindings)))
                }
                WildcardBound::Super(t) => {
                    WildcardBound::Super(Box::new(substitute(t, bindings)))
                }
            },
        },
        TypeRef::Primitive { .. } | TypeRef::Void => ty.clone(),
    }
}

/// Resolves method signatures against a class index.
#[derive(Debug, Clone, Copy)]
pub struct MethodSignatureResolver<'a> {
    classes: &'a ClassIndex,
}

impl<'a> MethodSignatureResolver<'a> {
    /// Creates a resolver over `classes`.
    #[must_use]
    pub fn new(classes: &'a ClassIndex) -> Self {
        Self { classes }
    }

    /// Bindings of a parameterized reference such as `Page<String>` for the
    /// referenced class's own type parameters.
    #[must_use]
    pub fn instance_bindings(&self, ty: &TypeRef) -> Bindings {
        let Some(class) = ty.class_name().and_then(|name| self.classes.get(name)) else {
            return Bindings::new();
        };
        class
            .type_params
            .iter()
            .cloned()
            .zip(ty.type_args().iter().cloned())
            .collect()
    }

    /// Walks from `start` (with its own variables bound by `start_bindings`)
    /// up the superclass chain to `target`, returning `target`'s bindings.
    pub fn bindings_along(
        &self,
        start: &ClassDef,
        start_bindings: Bindings,
        target: &str,
    ) -> Result<Bindings, ContractError> {
        let mut current_name = start.name.clone();
        let mut bindings = start_bindings;
        let mut superclass = start.superclass.clone();
        let mut hops = 0;

        while current_name != target {
            hops += 1;
            let parent_ref = superclass
                .filter(|s| s.class_name().is_some_and(|name| name != ROOT_CLASS))
                .filter(|_| hops <= self.classes.len())
                .ok_or_else(|| ContractError::NotASubclass {
                    leaf: start.name.clone(),
                    declaring: target.to_string(),
                })?;
            let parent_name = parent_ref.class_name().unwrap_or(ROOT_CLASS);
            let parent = self
                .classes
                .get(parent_name)
                .ok_or_else(|| ContractError::UnknownClass {
                    name: parent_name.to_string(),
                    referenced_by: current_name.clone(),
                })?;

            let args: Vec<TypeRef> = parent_ref
                .type_args()
                .iter()
                .map(|arg| substitute(arg, &bindings))
                .collect();
            bindings = parent.type_params.iter().cloned().zip(args).collect();
            current_name = parent.name.clone();
            superclass = parent.superclass.clone();
        }
        Ok(bindings)
    }

    /// Resolves method `index` of `declaring` as seen from `leaf`.
    ///
    /// Wildcards anywhere in a resolved parameter or return type are
    /// rejected. Variables the leaf cannot bind stay as [`TypeRef::Var`].
    ///
    /// # Example
    ///
    /// ```
    /// use apiary_contract::MethodSignatureResolver;
    /// use apiary_core::{fixtures, Primitive, TypeRef};
    ///
    /// let classes = fixtures::generic_hierarchy();
    /// let leaf = classes.get("Leaf").unwrap();
    /// let base = classes.get("Base").unwrap();
    ///
    /// let get = MethodSignatureResolver::new(&classes).resolve(leaf, base, 0).unwrap();
    /// assert_eq!(get.returns, TypeRef::class("String"));
    /// assert_eq!(get.params, vec![TypeRef::primitive(Primitive::Long)]);
    /// ```
    pub fn resolve(
        &self,
        leaf: &ClassDef,
        declaring: &Arc<ClassDef>,
        index: usize,
    ) -> Result<ResolvedMethod, ContractError> {
        let method = &declaring.methods[index];
        let bindings = self.bindings_along(leaf, Bindings::new(), &declaring.name)?;

        let params: Vec<TypeRef> = method
            .params
            .iter()
            .map(|p| substitute(&p.ty, &bindings))
            .collect();
        let returns = substitute(&method.returns, &bindings);

        let key = SignatureKey {
            name: method.name.clone(),
            params: params.iter().map(TypeRef::erasure).collect(),
        };

        for ty in params.iter().chain(std::iter::once(&returns)) {
            if let Some(wildcard) = ty.find_wildcard() {
                return Err(ContractError::UnsupportedWildcard {
                    method: MethodRef::new(leaf.name.clone(), key.name.clone(), key.params.clone()),
                    ty: ty.to_string(),
                    wildcard: wildcard.to_string(),
                });
            }
        }

        Ok(ResolvedMethod {
            declaring: Arc::clone(declaring),
            index,
            params,
            returns,
            key,
        })
    }
}
