//! Type references used by the class model.
//!
//! A [`TypeRef`] is the structural description of a declared type: a
//! primitive, a (possibly parameterized) class, an array, a type variable,
//! a wildcard or `void`. Type references are plain data; resolving them
//! against a class hierarchy is the job of the contract crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the universal root class. Hierarchy walks stop before it.
pub const ROOT_CLASS: &str = "Object";

/// Primitive (unboxed) value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    /// Boolean flag.
    Boolean,
    /// Signed 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Short,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Single character.
    Char,
}

impl Primitive {
    /// Returns the source-level name of the primitive.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
        }
    }
}

/// Variance of a wildcard type argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "variance", content = "bound", rename_all = "snake_case")]
pub enum WildcardBound {
    /// `?`
    Unbounded,
    /// `? extends X`
    Extends(Box<TypeRef>),
    /// `? super X`
    Super(Box<TypeRef>),
}

/// A declared type as it appears in a method signature or property.
///
/// # Example
///
/// ```
/// use apiary_core::{Primitive, TypeRef};
///
/// let list_of_t = TypeRef::generic("List", vec![TypeRef::var("T")]);
/// assert_eq!(list_of_t.to_string(), "List<T>");
/// assert!(list_of_t.contains_var());
///
/// let ids = TypeRef::array(TypeRef::primitive(Primitive::Long));
/// assert_eq!(ids.erasure(), "long[]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// An unboxed primitive.
    Primitive {
        /// The primitive kind.
        primitive: Primitive,
    },
    /// A class, optionally parameterized.
    Class {
        /// Class name.
        name: String,
        /// Type arguments in declaration order.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<TypeRef>,
    },
    /// An array of the element type.
    Array {
        /// Element type.
        element: Box<TypeRef>,
    },
    /// A type variable such as `T`.
    Var {
        /// Variable name.
        name: String,
    },
    /// A wildcard type argument.
    Wildcard {
        /// Wildcard bound.
        bound: WildcardBound,
    },
    /// No value.
    Void,
}

impl TypeRef {
    /// Creates a primitive type reference.
    #[must_use]
    pub const fn primitive(primitive: Primitive) -> Self {
        Self::Primitive { primitive }
    }

    /// Creates a non-generic class reference.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Creates a parameterized class reference.
    #[must_use]
    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self::Class {
            name: name.into(),
            args,
        }
    }

    /// Creates an array reference.
    #[must_use]
    pub fn array(element: TypeRef) -> Self {
        Self::Array {
            element: Box::new(element),
        }
    }

    /// Creates a type variable reference.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var { name: name.into() }
    }

    /// Creates `? extends bound`.
    #[must_use]
    pub fn wildcard_extends(bound: TypeRef) -> Self {
        Self::Wildcard {
            bound: WildcardBound::Extends(Box::new(bound)),
        }
    }

    /// Creates `? super bound`.
    #[must_use]
    pub fn wildcard_super(bound: TypeRef) -> Self {
        Self::Wildcard {
            bound: WildcardBound::Super(Box::new(bound)),
        }
    }

    /// Creates the `void` type.
    #[must_use]
    pub const fn void() -> Self {
        Self::Void
    }

    /// Returns the class name for class references.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the type arguments of a class reference (empty otherwise).
    #[must_use]
    pub fn type_args(&self) -> &[TypeRef] {
        match self {
            Self::Class { args, .. } => args,
            _ => &[],
        }
    }

    /// Returns `true` for `void`.
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Returns `true` if a type variable occurs anywhere in this type.
    #[must_use]
    pub fn contains_var(&self) -> bool {
        match self {
            Self::Var { .. } => true,
            Self::Class { args, .. } => args.iter().any(Self::contains_var),
            Self::Array { element } => element.contains_var(),
            Self::Wildcard { bound } => match bound {
                WildcardBound::Unbounded => false,
                WildcardBound::Extends(t) | WildcardBound::Super(t) => t.contains_var(),
            },
            Self::Primitive { .. } | Self::Void => false,
        }
    }

    /// Returns the first wildcard found in this type, depth first.
    #[must_use]
    pub fn find_wildcard(&self) -> Option<&TypeRef> {
        match self {
            Self::Wildcard { .. } => Some(self),
            Self::Class { args, .. } => args.iter().find_map(Self::find_wildcard),
            Self::Array { element } => element.find_wildcard(),
            _ => None,
        }
    }

    /// Returns the erased name used in signature keys.
    ///
    /// Type arguments are dropped; unresolved variables and wildcards erase
    /// to the root class.
    #[must_use]
    pub fn erasure(&self) -> String {
        match self {
            Self::Primitive { primitive } => primitive.as_str().to_string(),
            Self::Class { name, .. } => name.clone(),
            Self::Array { element } => format!("{}[]", element.erasure()),
            Self::Var { .. } | Self::Wildcard { .. } => ROOT_CLASS.to_string(),
            Self::Void => "void".to_string(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { primitive } => f.write_str(primitive.as_str()),
            Self::Class { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Self::Array { element } => write!(f, "{element}[]"),
            Self::Var { name } => f.write_str(name),
            Self::Wildcard { bound } => match bound {
                WildcardBound::Unbounded => f.write_str("?"),
                WildcardBound::Extends(t) => write!(f, "? extends {t}"),
                WildcardBound::Super(t) => write!(f, "? super {t}"),
            },
            Self::Void => f.write_str("void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested_generics() {
        let ty = TypeRef::generic(
            "Map",
            vec![
                TypeRef::class("String"),
                TypeRef::generic("List", vec![TypeRef::var("T")]),
            ],
        );
        assert_eq!(ty.to_string(), "Map<String, List<T>>");
    }

    #[test]
    fn test_erasure_drops_arguments() {
        let ty = TypeRef::generic("List", vec![TypeRef::class("String")]);
        assert_eq!(ty.erasure(), "List");
        assert_eq!(TypeRef::var("T").erasure(), ROOT_CLASS);
        assert_eq!(
            TypeRef::array(TypeRef::array(TypeRef::class("Long"))).erasure(),
            "Long[][]"
        );
    }

    #[test]
    fn test_find_nested_wildcard() {
        let ty = TypeRef::generic(
            "List",
            vec![TypeRef::generic(
                "Set",
                vec![TypeRef::wildcard_extends(TypeRef::class("Number"))],
            )],
        );
        let wildcard = ty.find_wildcard().expect("nested wildcard");
        assert_eq!(wildcard.to_string(), "? extends Number");
        assert!(TypeRef::class("String").find_wildcard().is_none());
    }

    #[test]
    fn test_serde_shape() {
        let ty = TypeRef::generic("List", vec![TypeRef::primitive(Primitive::Long)]);
        let json = serde_json::to_value(&ty).expect("serialize");
        assert_eq!(json["kind"], "class");
        assert_eq!(json["args"][0]["primitive"], "long");
        let back: TypeRef = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, ty);
    }
}
