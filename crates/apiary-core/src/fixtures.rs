//! Test fixtures for Apiary development and testing.
//!
//! Pre-built class hierarchies shared by the unit and integration tests of
//! every crate in the workspace.
//!
//! # Example
//!
//! ```
//! use apiary_core::fixtures;
//!
//! let classes = fixtures::greeting_index();
//! assert!(classes.get("GreetingService").is_some());
//! assert!(classes.get("Node").is_some());
//! ```

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::class::{ClassDef, ClassIndex, MethodDef, ParamDef, PropertyDef};
use crate::error::ServiceFault;
use crate::fragment::{ApiFragment, AuthLevel, MethodFragment, ParameterFragment};
use crate::invoke::{Arguments, Invoker};
use crate::types::{Primitive, TypeRef};

fn long() -> TypeRef {
    TypeRef::primitive(Primitive::Long)
}

/// `Base<T>` declaring `T get(long id)`, and `Leaf extends Base<String>`.
///
/// ```
/// use apiary_core::fixtures::generic_hierarchy;
///
/// let classes = generic_hierarchy();
/// assert_eq!(classes.superclass_chain("Leaf").len(), 2);
/// ```
#[must_use]
pub fn generic_hierarchy() -> ClassIndex {
    ClassIndex::new()
        .with(
            ClassDef::abstract_class("Base")
                .type_param("T")
                .method(
                    MethodDef::new("get")
                        .param(ParamDef::named("id", long()))
                        .returns(TypeRef::var("T")),
                )
                .method(
                    MethodDef::new("all")
                        .param(ParamDef::named(
                            "filters",
                            TypeRef::generic("List", vec![TypeRef::var("T")]),
                        ))
                        .returns(TypeRef::generic("List", vec![TypeRef::var("T")])),
                ),
        )
        .with(
            ClassDef::concrete("Leaf")
                .extends(TypeRef::generic("Base", vec![TypeRef::class("String")]))
                .api(ApiFragment::named("leaf", "v1")),
        )
}

/// `Node { Node child; List<Node> children; String label; }`.
#[must_use]
pub fn node_class() -> ClassDef {
    ClassDef::concrete("Node")
        .property(PropertyDef::new("label", TypeRef::class("String")))
        .property(PropertyDef::new("child", TypeRef::class("Node")))
        .property(PropertyDef::new(
            "children",
            TypeRef::generic("List", vec![TypeRef::class("Node")]),
        ))
}

/// `enum Color { RED, GREEN, BLUE }`.
#[must_use]
pub fn color_enum() -> ClassDef {
    ClassDef::enumeration("Color", ["RED", "GREEN", "BLUE"])
}

/// The `Greeting` resource.
#[must_use]
pub fn greeting_class() -> ClassDef {
    ClassDef::concrete("Greeting")
        .property(PropertyDef::new("id", long()))
        .property(PropertyDef::new("message", TypeRef::class("String")))
        .property(PropertyDef::new("color", TypeRef::class("Color")))
        .property(PropertyDef::new("internalNote", TypeRef::class("String")).ignored())
}

/// Wire form of a greeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    /// Identifier.
    #[serde(default)]
    pub id: i64,
    /// Text.
    pub message: String,
    /// Optional color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// In-memory greeting store backing [`greeting_service`].
#[derive(Debug, Default)]
pub struct GreetingStore {
    greetings: Mutex<Vec<Greeting>>,
}

impl GreetingStore {
    /// Creates a store seeded with `greetings`.
    #[must_use]
    pub fn with_greetings(greetings: Vec<Greeting>) -> Self {
        Self {
            greetings: Mutex::new(greetings),
        }
    }

    fn locked<T>(&self, f: impl FnOnce(&mut Vec<Greeting>) -> T) -> Result<T, ServiceFault> {
        let mut guard = self
            .greetings
            .lock()
            .map_err(|_| ServiceFault::internal("greeting store poisoned"))?;
        Ok(f(&mut guard))
    }

    /// Looks a greeting up.
    pub fn get(&self, id: i64) -> Result<Greeting, ServiceFault> {
        self.locked(|all| all.iter().find(|g| g.id == id).cloned())?
            .ok_or_else(|| ServiceFault::not_found(format!("greeting {id} does not exist")))
    }

    /// Lists every greeting.
    pub fn list(&self) -> Result<Vec<Greeting>, ServiceFault> {
        self.locked(|all| all.clone())
    }

    /// Stores a greeting, assigning the next id.
    pub fn insert(&self, mut greeting: Greeting) -> Result<Greeting, ServiceFault> {
        self.locked(|all| {
            greeting.id = all.iter().map(|g| g.id).max().unwrap_or(0) + 1;
            all.push(greeting.clone());
            greeting
        })
    }

    /// Deletes a greeting.
    pub fn remove(&self, id: i64) -> Result<(), ServiceFault> {
        let removed = self.locked(|all| {
            let before = all.len();
            all.retain(|g| g.id != id);
            before != all.len()
        })?;
        if removed {
            Ok(())
        } else {
            Err(ServiceFault::not_found(format!("greeting {id} does not exist")))
        }
    }
}

/// The `GreetingService` class, bound to [`GreetingStore`].
///
/// | Method | Inferred route |
/// |---|---|
/// | `get(long id)` | `GET greeting/get/{id}` |
/// | `list()` | `GET greeting/list` |
/// | `insert(Greeting)` | `POST greeting/insert` |
/// | `remove(long id)` | `DELETE greeting/remove/{id}` |
/// | `search(String[] words, int limit)` | `GET greeting/search` |
#[must_use]
pub fn greeting_service() -> ClassDef {
    ClassDef::concrete("GreetingService")
        .api(ApiFragment {
            auth_level: Some(AuthLevel::Optional),
            ..ApiFragment::named("greetings", "v1")
        })
        .with_config(crate::fragment::ClassFragment {
            resource: Some("greeting".to_string()),
            ..Default::default()
        })
        .method(
            MethodDef::new("get")
                .param(ParamDef::named("id", long()))
                .returns(TypeRef::class("Greeting"))
                .invoker(Invoker::new(|svc: Arc<GreetingStore>, args: Arguments| async move {
                    Ok(svc.get(args.get(0)?)?)
                })),
        )
        .method(
            MethodDef::new("list")
                .returns(TypeRef::generic("List", vec![TypeRef::class("Greeting")]))
                .invoker(Invoker::new(|svc: Arc<GreetingStore>, _args: Arguments| async move {
                    Ok(svc.list()?)
                })),
        )
        .method(
            MethodDef::new("insert")
                .param(ParamDef::new(TypeRef::class("Greeting")))
                .returns(TypeRef::class("Greeting"))
                .invoker(Invoker::new(|svc: Arc<GreetingStore>, args: Arguments| async move {
                    Ok(svc.insert(args.get(0)?)?)
                })),
        )
        .method(
            MethodDef::new("remove")
                .param(ParamDef::named("id", long()))
                .with_config(MethodFragment {
                    auth_level: Some(AuthLevel::Required),
                    ..Default::default()
                })
                .invoker(Invoker::new(|svc: Arc<GreetingStore>, args: Arguments| async move {
                    Ok(svc.remove(args.get(0)?)?)
                })),
        )
        .method(
            MethodDef::new("search")
                .param(ParamDef::named(
                    "words",
                    TypeRef::array(TypeRef::class("String")),
                ))
                .param(ParamDef::new(TypeRef::primitive(Primitive::Int)).with_config(
                    ParameterFragment::named("limit").default_value("10"),
                ))
                .returns(TypeRef::generic("List", vec![TypeRef::class("Greeting")]))
                .with_config(MethodFragment {
                    http_method: Some(http::Method::GET),
                    ..Default::default()
                })
                .invoker(Invoker::new(|svc: Arc<GreetingStore>, args: Arguments| async move {
                    let words: Vec<String> = args.get(0)?;
                    let limit: usize = args.get(1)?;
                    let found = svc
                        .list()?
                        .into_iter()
                        .filter(|g| words.iter().any(|w| g.message.contains(w.as_str())))
                        .take(limit)
                        .collect::<Vec<_>>();
                    Ok(found)
                })),
        )
}

/// Every fixture class in one index.
#[must_use]
pub fn greeting_index() -> ClassIndex {
    ClassIndex::new()
        .with(color_enum())
        .with(greeting_class())
        .with(node_class())
        .with(greeting_service())
}
