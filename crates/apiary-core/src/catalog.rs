//! Wire type catalog.
//!
//! The [`TypeCatalog`] decides how a declared type travels on the wire:
//! as a bindable scalar (with its parameter and schema type/format), as a
//! request-scoped injected value, as a repeated value, or as a resource
//! that needs a schema.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::class::ClassIndex;
use crate::types::{Primitive, TypeRef};

/// A wire type and optional format, e.g. `string`/`int64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireType {
    /// JSON type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Format qualifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl WireType {
    fn new(type_name: &str, format: Option<&str>) -> Self {
        Self {
            type_name: type_name.to_string(),
            format: format.map(ToString::to_string),
        }
    }
}

/// Scalar kinds that can be bound from a single wire value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scalar", content = "values", rename_all = "snake_case")]
pub enum ScalarKind {
    /// `true` / `false`.
    Boolean,
    /// 32-bit integer (also byte and short).
    Int32,
    /// 64-bit integer.
    Int64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Text.
    String,
    /// Single character.
    Char,
    /// Calendar date, `YYYY-MM-DD`.
    Date,
    /// RFC 3339 timestamp.
    DateTime,
    /// Base64-encoded bytes.
    Bytes,
    /// One of the listed constants.
    Enum(Vec<String>),
}

impl ScalarKind {
    /// Type and format used when the scalar is a request parameter.
    #[must_use]
    pub fn parameter_type(&self) -> WireType {
        match self {
            Self::Boolean => WireType::new("boolean", None),
            Self::Int32 => WireType::new("integer", Some("int32")),
            Self::Int64 => WireType::new("string", Some("int64")),
            Self::Float => WireType::new("number", Some("float")),
            Self::Double => WireType::new("number", Some("double")),
            Self::String | Self::Char | Self::Enum(_) => WireType::new("string", None),
            Self::Date => WireType::new("string", Some("date")),
            Self::DateTime => WireType::new("string", Some("date-time")),
            Self::Bytes => WireType::new("string", Some("byte")),
        }
    }

    /// Type and format used when the scalar appears inside a schema.
    ///
    /// Schemas carry 64-bit integers as strings like parameters do, but
    /// characters are narrowed to a one-character string.
    #[must_use]
    pub fn schema_type(&self) -> WireType {
        match self {
            Self::Char => WireType::new("string", Some("char")),
            other => other.parameter_type(),
        }
    }

    /// Parses a raw wire string into the JSON value handed to services.
    ///
    /// # Example
    ///
    /// ```
    /// use apiary_core::ScalarKind;
    ///
    /// assert_eq!(ScalarKind::Int64.coerce("42").unwrap(), serde_json::json!(42));
    /// assert!(ScalarKind::Boolean.coerce("yes").is_err());
    /// ```
    pub fn coerce(&self, raw: &str) -> Result<Value, String> {
        match self {
            Self::Boolean => {
                if raw.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(format!("'{raw}' is not a boolean"))
                }
            }
            Self::Int32 => raw
                .trim()
                .parse::<i32>()
                .map(Value::from)
                .map_err(|e| format!("'{raw}' is not a 32-bit integer: {e}")),
            Self::Int64 => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| format!("'{raw}' is not a 64-bit integer: {e}")),
            Self::Float | Self::Double => {
                let parsed = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| format!("'{raw}' is not a number: {e}"))?;
                serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| format!("'{raw}' is not a finite number"))
            }
            Self::String => Ok(Value::String(raw.to_string())),
            Self::Char => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::String(c.to_string())),
                    _ => Err(format!("'{raw}' is not a single character")),
                }
            }
            Self::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .map_err(|e| format!("'{raw}' is not a date: {e}")),
            Self::DateTime => DateTime::parse_from_rfc3339(raw)
                .map(|d| Value::String(d.to_rfc3339()))
                .map_err(|e| format!("'{raw}' is not an RFC 3339 timestamp: {e}")),
            Self::Bytes => STANDARD
                .decode(raw)
                .map(|bytes| Value::Array(bytes.into_iter().map(Value::from).collect()))
                .map_err(|e| format!("'{raw}' is not base64: {e}")),
            Self::Enum(constants) => {
                if constants.iter().any(|c| c == raw) {
                    Ok(Value::String(raw.to_string()))
                } else {
                    Err(format!("'{raw}' is not one of [{}]", constants.join(", ")))
                }
            }
        }
    }

    /// Accepts a value already decoded from a JSON body.
    ///
    /// Strings go through [`coerce`](Self::coerce); native JSON values of
    /// the matching shape pass through unchanged.
    pub fn accept(&self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (_, Value::String(raw)) => self.coerce(&raw),
            (Self::Boolean, v @ Value::Bool(_)) => Ok(v),
            (Self::Int32, Value::Number(n)) => n
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::from)
                .ok_or_else(|| format!("{n} is not a 32-bit integer")),
            (Self::Int64, Value::Number(n)) => n
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| format!("{n} is not a 64-bit integer")),
            (Self::Float | Self::Double, v @ Value::Number(_)) => Ok(v),
            (Self::Bytes, v @ Value::Array(_)) => Ok(v),
            (kind, other) => Err(format!("{other} is not a valid {}", kind.label())),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Char => "char",
            Self::Date => "date",
            Self::DateTime => "date-time",
            Self::Bytes => "byte string",
            Self::Enum(_) => "enum constant",
        }
    }
}

/// Request-scoped values supplied by the runtime instead of the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectedKind {
    /// The raw inbound request (headers).
    Request,
    /// The hosting container context.
    ServletContext,
    /// The authenticated identity.
    User,
}

/// Maps declared types to their wire representation.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    injected: HashMap<String, InjectedKind>,
    collections: HashSet<String>,
    maps: HashSet<String>,
    any: HashSet<String>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        let injected = [
            ("HttpRequest", InjectedKind::Request),
            ("HttpServletRequest", InjectedKind::Request),
            ("ServletContext", InjectedKind::ServletContext),
            ("User", InjectedKind::User),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();

        Self {
            injected,
            collections: ["Collection", "List", "Set"].map(String::from).into(),
            maps: ["Map"].map(String::from).into(),
            any: ["Object", "JsonValue"].map(String::from).into(),
        }
    }
}

impl TypeCatalog {
    /// Creates the catalog with the built-in tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an additional injected type.
    #[must_use]
    pub fn with_injected(mut self, name: impl Into<String>, kind: InjectedKind) -> Self {
        self.injected.insert(name.into(), kind);
        self
    }

    /// Registers an additional collection type.
    #[must_use]
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collections.insert(name.into());
        self
    }

    /// Returns the injected kind of `ty`, if any.
    #[must_use]
    pub fn injected(&self, ty: &TypeRef) -> Option<InjectedKind> {
        ty.class_name().and_then(|name| self.injected.get(name).copied())
    }

    /// Returns `true` for a collection class reference.
    #[must_use]
    pub fn is_collection(&self, ty: &TypeRef) -> bool {
        ty.class_name().is_some_and(|name| self.collections.contains(name))
    }

    /// Returns `true` for a map class reference.
    #[must_use]
    pub fn is_map(&self, ty: &TypeRef) -> bool {
        ty.class_name().is_some_and(|name| self.maps.contains(name))
    }

    /// Returns `true` for the untyped JSON value types.
    #[must_use]
    pub fn is_any(&self, ty: &TypeRef) -> bool {
        ty.class_name().is_some_and(|name| self.any.contains(name))
    }

    /// Returns the element type of an array or collection.
    ///
    /// `byte[]` is a scalar and never repeated.
    #[must_use]
    pub fn repeated_element<'t>(&self, ty: &'t TypeRef) -> Option<&'t TypeRef> {
        match ty {
            TypeRef::Array { element } => match element.as_ref() {
                TypeRef::Primitive {
                    primitive: Primitive::Byte,
                } => None,
                other => Some(other),
            },
            TypeRef::Class { args, .. } if self.is_collection(ty) => args.first(),
            _ => None,
        }
    }

    /// Number of repetition levels wrapped around the innermost type.
    #[must_use]
    pub fn nesting_depth(&self, ty: &TypeRef) -> usize {
        let mut depth = 0;
        let mut current = ty;
        while let Some(element) = self.repeated_element(current) {
            depth += 1;
            current = element;
        }
        depth
    }

    /// Innermost element after peeling every repetition level.
    #[must_use]
    pub fn innermost<'t>(&self, ty: &'t TypeRef) -> &'t TypeRef {
        let mut current = ty;
        while let Some(element) = self.repeated_element(current) {
            current = element;
        }
        current
    }

    /// Returns the scalar kind of `ty`, consulting `classes` for enums.
    #[must_use]
    pub fn scalar_kind(&self, ty: &TypeRef, classes: &ClassIndex) -> Option<ScalarKind> {
        match ty {
            TypeRef::Primitive { primitive } => Some(match primitive {
                Primitive::Boolean => ScalarKind::Boolean,
                Primitive::Byte | Primitive::Short | Primitive::Int => ScalarKind::Int32,
                Primitive::Long => ScalarKind::Int64,
                Primitive::Float => ScalarKind::Float,
                Primitive::Double => ScalarKind::Double,
                Primitive::Char => ScalarKind::Char,
            }),
            TypeRef::Array { element } => match element.as_ref() {
                TypeRef::Primitive {
                    primitive: Primitive::Byte,
                } => Some(ScalarKind::Bytes),
                _ => None,
            },
            TypeRef::Class { name, .. } => match name.as_str() {
                "Boolean" => Some(ScalarKind::Boolean),
                "Byte" | "Short" | "Integer" => Some(ScalarKind::Int32),
                "Long" => Some(ScalarKind::Int64),
                "Float" => Some(ScalarKind::Float),
                "Double" => Some(ScalarKind::Double),
                "String" => Some(ScalarKind::String),
                "Character" => Some(ScalarKind::Char),
                "Date" | "DateAndTime" => Some(ScalarKind::DateTime),
                "SimpleDate" => Some(ScalarKind::Date),
                _ => classes
                    .get(name)
                    .and_then(|class| class.enum_constants())
                    .map(|constants| ScalarKind::Enum(constants.to_vec())),
            },
            TypeRef::Var { .. } | TypeRef::Wildcard { .. } | TypeRef::Void => None,
        }
    }

    /// Parameter wire type of a scalar type.
    #[must_use]
    pub fn parameter_type(&self, ty: &TypeRef, classes: &ClassIndex) -> Option<WireType> {
        self.scalar_kind(ty, classes).map(|kind| kind.parameter_type())
    }

    /// Schema wire type of a scalar or untyped value.
    #[must_use]
    pub fn schema_type(&self, ty: &TypeRef, classes: &ClassIndex) -> Option<WireType> {
        if self.is_any(ty) {
            return Some(WireType::new("any", None));
        }
        self.scalar_kind(ty, classes).map(|kind| kind.schema_type())
    }
}
