//! Cross-method contract validation.
//!
//! Runs once per API version over every assembled method and reports every
//! violation found. A non-empty result rejects the whole batch.

use std::collections::HashMap;
use tracing::warn;

use apiary_core::{ApiFragment, ClassIndex, ContractError, MethodRef};
use apiary_router::path_shape;

use crate::contract::{MethodConfig, ParameterKind};
use crate::hierarchy::{OverrideChain, ServiceHierarchy};
use crate::resolver::SignatureKey;

/// One service class after assembly.
#[derive(Debug, Clone)]
pub struct AssembledService {
    /// The flattened class.
    pub hierarchy: ServiceHierarchy,
    /// Assembled, non-ignored methods with their signature keys.
    pub methods: Vec<(SignatureKey, MethodConfig)>,
}

impl AssembledService {
    /// The API fragment governing the service, from the nearest class that
    /// declares one.
    #[must_use]
    pub fn api(&self) -> Option<&ApiFragment> {
        self.hierarchy.lineage.iter().find_map(|c| c.api.as_ref())
    }
}

/// Validates assembled services against each other.
#[derive(Debug, Clone, Copy)]
pub struct ContractValidator<'a> {
    classes: &'a ClassIndex,
}

impl<'a> ContractValidator<'a> {
    /// Creates a validator.
    #[must_use]
    pub fn new(classes: &'a ClassIndex) -> Self {
        Self { classes }
    }

    /// Validates the services of one API version.
    #[must_use]
    pub fn validate(&self, services: &[AssembledService]) -> Vec<ContractError> {
        let mut errors = Vec::new();
        for service in services {
            self.check_overloads(service, &mut errors);
            self.check_overrides(service, &mut errors);
        }
        check_rest_paths(services, &mut errors);
        check_method_names(services, &mut errors);
        check_unresolved_parameters(services, &mut errors);
        check_api_consistency(services, &mut errors);

        for error in &errors {
            warn!(kind = ?error.kind(), error = %error, "Contract validation failed");
        }
        errors
    }

    fn check_overloads(&self, service: &AssembledService, errors: &mut Vec<ContractError>) {
        let mut by_name: HashMap<&str, &SignatureKey> = HashMap::new();
        for (key, _) in &service.methods {
            match by_name.get(key.name.as_str()) {
                Some(first) if *first != key => errors.push(ContractError::OverloadedMethod {
                    first: key_ref(service, first),
                    second: key_ref(service, key),
                    reason: "overloads sharing a name cannot be told apart on the wire".to_string(),
                }),
                Some(_) => {}
                None => {
                    by_name.insert(&key.name, key);
                }
            }
        }
    }

    fn check_overrides(&self, service: &AssembledService, errors: &mut Vec<ContractError>) {
        for (key, _) in &service.methods {
            let Some(chain) = service.hierarchy.chains.get(key) else {
                continue;
            };
            if let Some(error) = self.incompatible_override(chain) {
                errors.push(error);
            }
        }
    }

    fn incompatible_override(&self, chain: &OverrideChain) -> Option<ContractError> {
        let leaf = chain.leaf();
        chain.ancestors().iter().find_map(|ancestor| {
            let reason = if leaf.params != ancestor.params {
                format!(
                    "parameter types ({}) differ from ({})",
                    join(&leaf.params),
                    join(&ancestor.params)
                )
            } else if !self.classes.is_assignable(&leaf.returns, &ancestor.returns) {
                format!(
                    "return type '{}' is not compatible with '{}'",
                    leaf.returns, ancestor.returns
                )
            } else {
                return None;
            };
            Some(ContractError::OverloadedMethod {
                first: leaf.method_ref(),
                second: ancestor.method_ref(),
                reason,
            })
        })
    }
}

fn join(types: &[apiary_core::TypeRef]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_ref(service: &AssembledService, key: &SignatureKey) -> MethodRef {
    MethodRef::new(
        service.hierarchy.class.name.clone(),
        key.name.clone(),
        key.params.clone(),
    )
}

fn all_methods(services: &[AssembledService]) -> impl Iterator<Item = &MethodConfig> {
    services
        .iter()
        .flat_map(|s| s.methods.iter().map(|(_, config)| config))
}

fn check_rest_paths(services: &[AssembledService], errors: &mut Vec<ContractError>) {
    let mut seen: HashMap<(String, String), &MethodConfig> = HashMap::new();
    for method in all_methods(services) {
        let key = (method.http_method.to_string(), path_shape(&method.path));
        if let Some(first) = seen.get(&key) {
            errors.push(ContractError::DuplicateRestPath {
                verb: key.0,
                shape: key.1,
                first: first.method.clone(),
                second: method.method.clone(),
            });
        } else {
            seen.insert(key, method);
        }
    }
}

fn check_method_names(services: &[AssembledService], errors: &mut Vec<ContractError>) {
    let mut seen: HashMap<&str, &MethodConfig> = HashMap::new();
    for method in all_methods(services) {
        if let Some(first) = seen.get(method.canonical_name.as_str()) {
            errors.push(ContractError::DuplicateMethodName {
                name: method.canonical_name.clone(),
                first: first.method.clone(),
                second: method.method.clone(),
            });
        } else {
            seen.insert(&method.canonical_name, method);
        }
    }
}

fn check_unresolved_parameters(services: &[AssembledService], errors: &mut Vec<ContractError>) {
    for method in all_methods(services) {
        for parameter in &method.parameters {
            if let (ParameterKind::Unresolved, Some(name)) = (&parameter.kind, &parameter.name) {
                errors.push(ContractError::UnresolvedWireParameter {
                    method: method.method.clone(),
                    parameter: name.clone(),
                    ty: parameter.declared_type.to_string(),
                });
            }
        }
    }
}

fn check_api_consistency(services: &[AssembledService], errors: &mut Vec<ContractError>) {
    let mut iter = services.iter().filter_map(|s| s.api().map(|api| (s, api)));
    let Some((_, reference)) = iter.next() else {
        return;
    };
    let api = reference.name.clone().unwrap_or_default();
    let version = reference.version.clone().unwrap_or_default();

    for (service, fragment) in iter {
        for field in differing_fields(reference, fragment) {
            errors.push(ContractError::InconsistentApiConfig {
                api: api.clone(),
                version: version.clone(),
                class: service.hierarchy.class.name.clone(),
                field: field.to_string(),
            });
        }
    }
}

/// API-level fields set on both fragments with different values.
fn differing_fields(a: &ApiFragment, b: &ApiFragment) -> Vec<&'static str> {
    fn differs<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
        matches!((a, b), (Some(x), Some(y)) if x != y)
    }

    let checks = [
        ("description", differs(&a.description, &b.description)),
        ("auth_level", differs(&a.auth_level, &b.auth_level)),
        ("scopes", differs(&a.scopes, &b.scopes)),
        ("audiences", differs(&a.audiences, &b.audiences)),
        ("client_ids", differs(&a.client_ids, &b.client_ids)),
        ("authenticators", differs(&a.authenticators, &b.authenticators)),
        ("peer_authenticators", differs(&a.peer_authenticators, &b.peer_authenticators)),
        ("frontend_limits", differs(&a.frontend_limits, &b.frontend_limits)),
        ("cache_control", differs(&a.cache_control, &b.cache_control)),
        ("namespace", differs(&a.namespace, &b.namespace)),
    ];
    checks
        .into_iter()
        .filter_map(|(field, differs)| differs.then_some(field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::ConfigAssembler;
    use crate::hierarchy::HierarchyReader;
    use crate::schema::SchemaRepository;
    use crate::transform::TransformerRegistry;
    use apiary_core::{
        fixtures, AuthLevel, ClassDef, MethodDef, MethodFragment, ParamDef, Primitive,
        TypeCatalog, TypeRef,
    };

    fn assemble(classes: &ClassIndex, services: &[&str]) -> Vec<AssembledService> {
        let catalog = TypeCatalog::new();
        let transformers = TransformerRegistry::new();
        let mut schemas = SchemaRepository::new(classes, &catalog, &transformers);
        let assembler = ConfigAssembler::new(classes, &catalog, &transformers);

        services
            .iter()
            .map(|name| {
                let hierarchy = HierarchyReader::new(classes).read(name).unwrap();
                let methods = hierarchy
                    .chains
                    .values()
                    .filter_map(|chain| {
                        assembler
                            .assemble(&hierarchy, chain, &mut schemas)
                            .unwrap()
                            .map(|config| (chain.key.clone(), config))
                    })
                    .collect();
                AssembledService { hierarchy, methods }
            })
            .collect()
    }

    fn validate(classes: &ClassIndex, services: &[&str]) -> Vec<ContractError> {
        ContractValidator::new(classes).validate(&assemble(classes, services))
    }

    fn with_api(class: ClassDef) -> ClassDef {
        class.api(apiary_core::ApiFragment::named("test", "v1"))
    }

    #[test]
    fn test_valid_service_passes() {
        let classes = fixtures::greeting_index();
        assert!(validate(&classes, &["GreetingService"]).is_empty());
    }

    #[test]
    fn test_sibling_overloads_are_rejected() {
        let classes = fixtures::greeting_index().with(with_api(
            ClassDef::concrete("Finder")
                .method(
                    MethodDef::new("foo")
                        .param(ParamDef::named("value", TypeRef::class("String")))
                        .returns(TypeRef::class("Greeting")),
                )
                .method(
                    MethodDef::new("foo")
                        .param(ParamDef::named("value", TypeRef::class("Long")))
                        .returns(TypeRef::class("Greeting")),
                ),
        ));
        let errors = validate(&classes, &["Finder"]);
        let overload = errors
            .iter()
            .find(|e| matches!(e, ContractError::OverloadedMethod { .. }))
            .unwrap();
        let message = overload.to_string();
        assert!(message.contains("Finder.foo(String)"));
        assert!(message.contains("Finder.foo(Long)"));
    }

    #[test]
    fn test_ignored_overload_is_not_a_conflict() {
        let classes = fixtures::greeting_index().with(with_api(
            ClassDef::concrete("Finder")
                .method(
                    MethodDef::new("foo")
                        .param(ParamDef::named("value", TypeRef::class("String")))
                        .returns(TypeRef::class("Greeting")),
                )
                .method(
                    MethodDef::new("foo")
                        .param(ParamDef::named("value", TypeRef::class("Long")))
                        .returns(TypeRef::class("Greeting"))
                        .with_config(MethodFragment {
                            ignored: Some(true),
                            ..Default::default()
                        }),
                ),
        ));
        assert!(validate(&classes, &["Finder"]).is_empty());
    }

    #[test]
    fn test_incompatible_return_in_chain() {
        let classes = fixtures::greeting_index()
            .with(
                ClassDef::abstract_class("Parent")
                    .method(MethodDef::new("get").returns(TypeRef::class("Greeting"))),
            )
            .with(with_api(
                ClassDef::concrete("Child")
                    .extends(TypeRef::class("Parent"))
                    .method(MethodDef::new("get").returns(TypeRef::class("Node"))),
            ));
        let errors = validate(&classes, &["Child"]);
        assert!(matches!(
            errors.as_slice(),
            [ContractError::OverloadedMethod { reason, .. }] if reason.contains("return type")
        ));
    }

    #[test]
    fn test_duplicate_rest_path_and_fix() {
        let make = |second_path: &str| {
            fixtures::greeting_index().with(with_api(
                ClassDef::concrete("Paths")
                    .method(
                        MethodDef::new("byId")
                            .param(ParamDef::named("id", TypeRef::primitive(Primitive::Long)))
                            .returns(TypeRef::class("Greeting"))
                            .with_config(MethodFragment {
                                path: Some("items/{id}".into()),
                                ..Default::default()
                            }),
                    )
                    .method(
                        MethodDef::new("byKey")
                            .param(ParamDef::named("key", TypeRef::class("String")))
                            .returns(TypeRef::class("Greeting"))
                            .with_config(MethodFragment {
                                path: Some(second_path.into()),
                                ..Default::default()
                            }),
                    ),
            ))
        };

        let errors = validate(&make("items/{key}"), &["Paths"]);
        assert!(matches!(
            errors.as_slice(),
            [ContractError::DuplicateRestPath { shape, .. }] if shape == "items/{}"
        ));
        assert!(validate(&make("keys/{key}"), &["Paths"]).is_empty());
    }

    #[test]
    fn test_duplicate_canonical_name_across_classes() {
        let service = |name: &str| {
            with_api(ClassDef::concrete(name).method(
                MethodDef::new("list")
                    .returns(TypeRef::class("Greeting"))
                    .with_config(MethodFragment {
                        path: Some(format!("{name}/list")),
                        ..Default::default()
                    }),
            ))
        };
        let classes = fixtures::greeting_index()
            .with(service("One"))
            .with(service("Two"));
        let errors = validate(&classes, &["One", "Two"]);
        assert!(matches!(
            errors.as_slice(),
            [ContractError::DuplicateMethodName { name, .. }] if name == "test.list"
        ));
    }

    #[test]
    fn test_named_unresolved_parameter() {
        let classes = fixtures::greeting_index().with(with_api(
            ClassDef::concrete("Holder").type_param("T").method(
                MethodDef::new("put")
                    .param(ParamDef::named("item", TypeRef::var("T")))
                    .returns(TypeRef::class("Greeting")),
            ),
        ));
        let errors = validate(&classes, &["Holder"]);
        assert!(matches!(
            errors.as_slice(),
            [ContractError::UnresolvedWireParameter { parameter, .. }] if parameter == "item"
        ));
    }

    #[test]
    fn test_inconsistent_api_fragments() {
        let api = |level| apiary_core::ApiFragment {
            auth_level: Some(level),
            ..apiary_core::ApiFragment::named("test", "v1")
        };
        let classes = fixtures::greeting_index()
            .with(
                ClassDef::concrete("A")
                    .api(api(AuthLevel::Required))
                    .method(MethodDef::new("a").returns(TypeRef::class("Greeting"))),
            )
            .with(
                ClassDef::concrete("B")
                    .api(api(AuthLevel::None))
                    .method(MethodDef::new("b").returns(TypeRef::class("Greeting"))),
            );
        let errors = validate(&classes, &["A", "B"]);
        assert!(matches!(
            errors.as_slice(),
            [ContractError::InconsistentApiConfig { class, field, .. }] if class == "B" && field == "auth_level"
        ));
    }
}
