//! Method assembly.
//!
//! [`ConfigAssembler`] turns one override chain into a [`MethodConfig`]:
//! it merges the configuration layers, classifies every parameter, infers
//! the REST path and verb when they are not configured, parses defaults
//! and resolves request and response schemas.

use http::Method;
use serde_json::Value;
use std::collections::HashSet;

use apiary_core::{ClassIndex, ContractError, MethodRef, TypeCatalog, TypeRef};
use apiary_router::{Node, SegmentKind};

use crate::contract::{MethodConfig, ParameterConfig, ParameterKind, ParameterLocation};
use crate::hierarchy::{OverrideChain, ServiceHierarchy};
use crate::merge::{merge_method, merge_parameter, MethodSettings};
use crate::schema::{Schema, SchemaError, SchemaRepository};
use crate::transform::{TransformerChain, TransformerRegistry};

/// Assembles method configurations.
#[derive(Debug, Clone, Copy)]
pub struct ConfigAssembler<'a> {
    classes: &'a ClassIndex,
    catalog: &'a TypeCatalog,
    transformers: &'a TransformerRegistry,
    infer_rest_conventions: bool,
}

impl<'a> ConfigAssembler<'a> {
    /// Creates an assembler with REST inference enabled.
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
            infer_rest_conventions: true,
        }
    }

    /// Enables or disables path and verb inference.
    #[must_use]
    pub fn infer_rest_conventions(mut self, enabled: bool) -> Self {
        self.infer_rest_conventions = enabled;
        self
    }

    /// Assembles the method of `chain`.
    ///
    /// Returns `Ok(None)` for ignored methods. Every problem found in the
    /// method is reported.
    pub fn assemble(
        &self,
        hierarchy: &ServiceHierarchy,
        chain: &OverrideChain,
        schemas: &mut SchemaRepository<'_>,
    ) -> Result<Option<MethodConfig>, Vec<ContractError>> {
        let settings = merge_method(chain, hierarchy);
        if settings.ignored {
            return Ok(None);
        }

        let leaf = chain.leaf();
        let method_ref = MethodRef::new(
            hierarchy.class.name.clone(),
            chain.key.name.clone(),
            chain.key.params.clone(),
        );
        let mut errors = Vec::new();

        let wire_name = settings.name.clone().unwrap_or_else(|| chain.key.name.clone());
        let api_name = hierarchy
            .lineage
            .iter()
            .find_map(|c| c.api.as_ref().and_then(|a| a.name.clone()))
            .unwrap_or_default();
        let canonical_name = [Some(api_name.as_str()), settings.resource.as_deref(), Some(wire_name.as_str())]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(".");

        let mut parameters = Vec::with_capacity(leaf.params.len());
        let mut request = None;
        for (position, ty) in leaf.params.iter().enumerate() {
            match self.parameter(chain, &method_ref, position, ty, schemas) {
                Ok((parameter, body_schema)) => {
                    if let Some(schema) = body_schema {
                        request.get_or_insert(schema);
                    }
                    parameters.push(parameter);
                }
                Err(e) => errors.push(e),
            }
        }

        check_bodies(&method_ref, &parameters, &mut errors);
        check_names(&method_ref, &parameters, &mut errors);

        let path = match self.path(&settings, &wire_name, &method_ref, &mut parameters) {
            Ok(path) => path,
            Err(e) => {
                errors.push(e);
                String::new()
            }
        };
        check_path_parameters(&method_ref, &parameters, &mut errors);

        let http_method = match self.http_method(&settings, &wire_name, &leaf.returns, &parameters) {
            Some(verb) => verb,
            None => {
                errors.push(ContractError::MissingRestConfiguration {
                    method: method_ref.clone(),
                    missing: "http method".to_string(),
                });
                Method::POST
            }
        };

        let (response, response_transformers) =
            match self.response(&method_ref, &leaf.returns, schemas) {
                Ok(response) => response,
                Err(e) => {
                    errors.push(e);
                    (None, TransformerChain::empty())
                }
            };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Some(MethodConfig {
            canonical_name,
            wire_name,
            description: settings.description,
            path,
            http_method,
            parameters,
            request,
            response,
            response_transformers,
            auth_level: settings.auth_level,
            scopes: settings.scopes,
            audiences: settings.audiences,
            client_ids: settings.client_ids,
            authenticators: settings.authenticators,
            peer_authenticators: settings.peer_authenticators,
            method: method_ref,
            service_class: hierarchy.class.name.clone(),
            invoker: leaf.method().invoker.clone(),
        }))
    }

    fn parameter(
        &self,
        chain: &OverrideChain,
        method: &MethodRef,
        position: usize,
        ty: &TypeRef,
        schemas: &mut SchemaRepository<'_>,
    ) -> Result<(ParameterConfig, Option<Schema>), ContractError> {
        let config = merge_parameter(chain, position);
        let mut parameter = ParameterConfig {
            name: config.name.clone(),
            position,
            kind: ParameterKind::Unresolved,
            location: ParameterLocation::None,
            nullable: config.nullable.unwrap_or(false),
            default_value: None,
            declared_type: ty.clone(),
            wire_type: None,
            transformers: TransformerChain::empty(),
        };
        let label = config.name.clone().unwrap_or_else(|| format!("#{position}"));

        if let Some(injected) = self.catalog.injected(ty) {
            parameter.kind = ParameterKind::Injected { injected };
            parameter.location = ParameterLocation::Injected;
            return Ok((parameter, None));
        }
        if ty.contains_var() {
            return Ok((parameter, None));
        }

        let depth = self.catalog.nesting_depth(ty);
        if depth > 1 {
            return Err(ContractError::NestedCollection {
                method: method.clone(),
                parameter: label,
                ty: ty.to_string(),
            });
        }

        let element = self.catalog.innermost(ty);
        let mut chain = self
            .transformers
            .resolve_chain(element, &config.transformers, self.classes)
            .map_err(|e| ContractError::TransformerChain {
                method: method.clone(),
                ty: element.to_string(),
                reason: e.to_string(),
            })?;
        let wire = chain.wire_type(element).clone();

        let body_schema = match self.catalog.scalar_kind(&wire, self.classes) {
            Some(scalar) => {
                if config.name.is_none() {
                    return Err(ContractError::MissingParameterName {
                        method: method.clone(),
                        reason: format!("scalar parameter {label} of type '{ty}' has no wire name"),
                    });
                }
                parameter.wire_type = Some(scalar.parameter_type());
                parameter.location = ParameterLocation::Query;
                parameter.kind = ParameterKind::Scalar {
                    scalar,
                    repeated: depth == 1,
                };
                None
            }
            None => {
                let resolved = if depth == 0 {
                    schemas.resolve(ty, &chain)
                } else {
                    schemas.resolve_type(ty)
                };
                let schema = resolved.map_err(|e| self.schema_error(method, ty, &chain, e))?;
                if depth > 0 {
                    // Repeated resources bind element schemas as declared.
                    chain = TransformerChain::empty();
                }
                parameter.kind = ParameterKind::Resource;
                parameter.location = ParameterLocation::Body;
                Some(schema)
            }
        };
        parameter.transformers = chain;

        if let Some(raw) = config.default_value {
            parameter.default_value = Some(parse_default(method, &label, &parameter.kind, &raw)?);
        }

        Ok((parameter, body_schema))
    }

    fn schema_error(
        &self,
        method: &MethodRef,
        ty: &TypeRef,
        chain: &TransformerChain,
        error: SchemaError,
    ) -> ContractError {
        match error {
            SchemaError::UnsupportedWildcard { ty: wildcard } => ContractError::UnsupportedWildcard {
                method: method.clone(),
                ty: ty.to_string(),
                wildcard,
            },
            SchemaError::Unrepresentable { .. } if !chain.is_empty() => {
                ContractError::TransformerChain {
                    method: method.clone(),
                    ty: ty.to_string(),
                    reason: "does not end in a schema-representable type".to_string(),
                }
            }
            SchemaError::Unrepresentable { ty: name } => ContractError::UnknownClass {
                name,
                referenced_by: method.to_string(),
            },
            SchemaError::Transformer(e) => ContractError::TransformerChain {
                method: method.clone(),
                ty: ty.to_string(),
                reason: e.to_string(),
            },
        }
    }

    fn path(
        &self,
        settings: &MethodSettings,
        wire_name: &str,
        method: &MethodRef,
        parameters: &mut [ParameterConfig],
    ) -> Result<String, ContractError> {
        if let Some(explicit) = &settings.path {
            return explicit_path(explicit, method, parameters);
        }
        if !self.infer_rest_conventions {
            return Err(ContractError::MissingRestConfiguration {
                method: method.clone(),
                missing: "path".to_string(),
            });
        }

        let mut segments: Vec<String> = settings.resource.iter().cloned().collect();
        segments.push(wire_name.to_string());

        let mut scalars = parameters
            .iter_mut()
            .filter(|p| matches!(p.kind, ParameterKind::Scalar { .. }));
        if let (Some(only), None) = (scalars.next(), scalars.next()) {
            let simple = matches!(only.kind, ParameterKind::Scalar { repeated: false, .. });
            if simple && !only.is_optional() {
                if let Some(name) = &only.name {
                    segments.push(format!("{{{name}}}"));
                    only.location = ParameterLocation::Path;
                }
            }
        }
        Ok(segments.join("/"))
    }

    fn http_method(
        &self,
        settings: &MethodSettings,
        wire_name: &str,
        returns: &TypeRef,
        parameters: &[ParameterConfig],
    ) -> Option<Method> {
        if let Some(verb) = &settings.http_method {
            return Some(verb.clone());
        }
        if !self.infer_rest_conventions {
            return None;
        }

        let name = wire_name.to_ascii_lowercase();
        let has_body = parameters.iter().any(|p| p.location == ParameterLocation::Body);
        let scalars: Vec<&ParameterConfig> = parameters
            .iter()
            .filter(|p| matches!(p.kind, ParameterKind::Scalar { .. }))
            .collect();
        let all_simple = scalars
            .iter()
            .all(|p| matches!(p.kind, ParameterKind::Scalar { repeated: false, .. }));

        let verb = if ["insert", "create", "add"].iter().any(|p| name.starts_with(p)) {
            Method::POST
        } else if ["update", "patch"].iter().any(|p| name.starts_with(p)) {
            Method::PUT
        } else if ["remove", "delete"].iter().any(|p| name.starts_with(p)) {
            if !has_body && scalars.len() == 1 && all_simple {
                Method::DELETE
            } else {
                Method::POST
            }
        } else if !returns.is_void() && !has_body && scalars.len() <= 1 && all_simple {
            Method::GET
        } else {
            Method::POST
        };
        Some(verb)
    }

    fn response(
        &self,
        method: &MethodRef,
        returns: &TypeRef,
        schemas: &mut SchemaRepository<'_>,
    ) -> Result<(Option<Schema>, TransformerChain), ContractError> {
        if returns.is_void() {
            return Ok((None, TransformerChain::empty()));
        }
        let chain = self
            .transformers
            .resolve_chain(returns, &[], self.classes)
            .map_err(|e| ContractError::TransformerChain {
                method: method.clone(),
                ty: returns.to_string(),
                reason: e.to_string(),
            })?;
        let wire = chain.wire_type(returns);
        if self.catalog.scalar_kind(wire, self.classes).is_some() {
            return Err(ContractError::InvalidReturnType {
                method: method.clone(),
                ty: wire.to_string(),
            });
        }
        let schema = schemas
            .resolve(returns, &chain)
            .map_err(|e| self.schema_error(method, returns, &chain, e))?;
        Ok((Some(schema), chain))
    }
}

fn explicit_path(
    template: &str,
    method: &MethodRef,
    parameters: &mut [ParameterConfig],
) -> Result<String, ContractError> {
    let invalid = |reason: String| ContractError::InvalidPath {
        method: method.clone(),
        path: template.to_string(),
        reason,
    };
    let segments = Node::parse_path(template).map_err(|e| invalid(e.to_string()))?;

    let mut placeholders = HashSet::new();
    for (_, kind) in &segments {
        let SegmentKind::Param(name) = kind else {
            continue;
        };
        if !placeholders.insert(name.clone()) {
            return Err(invalid(format!("placeholder '{name}' appears twice")));
        }
        let parameter = parameters
            .iter_mut()
            .find(|p| p.name.as_deref() == Some(name.as_str()))
            .filter(|p| matches!(p.kind, ParameterKind::Scalar { .. }))
            .ok_or_else(|| invalid(format!("placeholder '{name}' does not name a scalar parameter")))?;
        parameter.location = ParameterLocation::Path;
    }

    Ok(segments
        .into_iter()
        .map(|(segment, _)| segment)
        .collect::<Vec<_>>()
        .join("/"))
}

fn parse_default(
    method: &MethodRef,
    parameter: &str,
    kind: &ParameterKind,
    raw: &str,
) -> Result<Value, ContractError> {
    let invalid = |reason: String| ContractError::InvalidDefaultValue {
        method: method.clone(),
        parameter: parameter.to_string(),
        value: raw.to_string(),
        reason,
    };
    match kind {
        ParameterKind::Scalar {
            scalar,
            repeated: false,
        } => scalar.coerce(raw).map_err(invalid),
        ParameterKind::Scalar {
            scalar,
            repeated: true,
        } => raw
            .split(',')
            .map(|item| scalar.coerce(item.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
            .map_err(invalid),
        _ => Err(invalid("only scalar parameters accept defaults".to_string())),
    }
}

fn check_bodies(method: &MethodRef, parameters: &[ParameterConfig], errors: &mut Vec<ContractError>) {
    let bodies: Vec<String> = parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Body)
        .map(|p| p.declared_type.to_string())
        .collect();
    if bodies.len() > 1 {
        errors.push(ContractError::MissingParameterName {
            method: method.clone(),
            reason: format!("more than one request body resource ({})", bodies.join(", ")),
        });
    }
}

fn check_names(method: &MethodRef, parameters: &[ParameterConfig], errors: &mut Vec<ContractError>) {
    let mut seen = HashSet::new();
    for name in parameters
        .iter()
        .filter(|p| p.location != ParameterLocation::Injected)
        .filter_map(|p| p.name.as_deref())
    {
        if !seen.insert(name) {
            errors.push(ContractError::DuplicateParameterName {
                method: method.clone(),
                parameter: name.to_string(),
            });
        }
    }
}

fn check_path_parameters(
    method: &MethodRef,
    parameters: &[ParameterConfig],
    errors: &mut Vec<ContractError>,
) {
    for p in parameters.iter().filter(|p| p.location == ParameterLocation::Path) {
        let name = p.name.clone().unwrap_or_default();
        if p.default_value.is_some() {
            errors.push(ContractError::DefaultOnPathParameter {
                method: method.clone(),
                parameter: name,
            });
        } else if p.nullable || matches!(p.kind, ParameterKind::Scalar { repeated: true, .. }) {
            errors.push(ContractError::NullablePathParameter {
                method: method.clone(),
                parameter: name,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyReader;
    use apiary_core::{
        fixtures, ApiFragment, AuthLevel, ClassDef, InjectedKind, MethodDef, MethodFragment,
        ParamDef, ParameterFragment, Primitive, ScalarKind,
    };
    use serde_json::json;

    struct Harness {
        classes: ClassIndex,
        catalog: TypeCatalog,
        transformers: TransformerRegistry,
    }

    impl Harness {
        fn new(classes: ClassIndex) -> Self {
            Self {
                classes,
                catalog: TypeCatalog::new(),
                transformers: TransformerRegistry::new(),
            }
        }

        fn with_service(service: ClassDef) -> Self {
            Self::new(fixtures::greeting_index().with(service.api(ApiFragment::named("test", "v1"))))
        }

        fn assemble_with(
            &self,
            service: &str,
            method: &str,
            infer: bool,
        ) -> Result<Option<MethodConfig>, Vec<ContractError>> {
            let hierarchy = HierarchyReader::new(&self.classes).read(service).unwrap();
            let chain = hierarchy.chains_named(method).next().unwrap();
            let mut schemas = SchemaRepository::new(&self.classes, &self.catalog, &self.transformers);
            ConfigAssembler::new(&self.classes, &self.catalog, &self.transformers)
                .infer_rest_conventions(infer)
                .assemble(&hierarchy, chain, &mut schemas)
        }

        fn assemble(&self, service: &str, method: &str) -> Result<Option<MethodConfig>, Vec<ContractError>> {
            self.assemble_with(service, method, true)
        }

        fn config(&self, service: &str, method: &str) -> MethodConfig {
            self.assemble(service, method).unwrap().unwrap()
        }

        fn errors(&self, service: &str, method: &str) -> Vec<ContractError> {
            self.assemble(service, method).unwrap_err()
        }
    }

    fn long() -> TypeRef {
        TypeRef::primitive(Primitive::Long)
    }

    fn greeting() -> TypeRef {
        TypeRef::class("Greeting")
    }

    #[test]
    fn test_greeting_service_conventions() {
        let h = Harness::new(fixtures::greeting_index());

        let get = h.config("GreetingService", "get");
        assert_eq!(get.canonical_name, "greetings.greeting.get");
        assert_eq!(get.http_method, Method::GET);
        assert_eq!(get.path, "greeting/get/{id}");
        assert_eq!(get.parameters[0].location, ParameterLocation::Path);
        assert_eq!(get.response, Some(Schema::Ref { id: "Greeting".into() }));
        assert_eq!(get.auth_level, AuthLevel::Optional);

        let list = h.config("GreetingService", "list");
        assert_eq!((list.http_method, list.path.as_str()), (Method::GET, "greeting/list"));

        let insert = h.config("GreetingService", "insert");
        assert_eq!(insert.http_method, Method::POST);
        assert_eq!(insert.path, "greeting/insert");
        assert_eq!(insert.body_parameter().unwrap().kind, ParameterKind::Resource);
        assert_eq!(insert.request, Some(Schema::Ref { id: "Greeting".into() }));

        let remove = h.config("GreetingService", "remove");
        assert_eq!(remove.http_method, Method::DELETE);
        assert_eq!(remove.path, "greeting/remove/{id}");
        assert_eq!(remove.auth_level, AuthLevel::Required);
        assert!(remove.response.is_none());
    }

    #[test]
    fn test_repeated_query_parameter_and_default() {
        let h = Harness::new(fixtures::greeting_index());
        let search = h.config("GreetingService", "search");

        assert_eq!(search.http_method, Method::GET);
        assert_eq!(search.path, "greeting/search");
        let words = &search.parameters[0];
        assert_eq!(
            words.kind,
            ParameterKind::Scalar {
                scalar: ScalarKind::String,
                repeated: true
            }
        );
        assert_eq!(words.location, ParameterLocation::Query);
        let limit = &search.parameters[1];
        assert_eq!(limit.default_value, Some(json!(10)));
        assert!(limit.is_optional());
    }

    #[test]
    fn test_array_of_boxed_scalars_is_repeated() {
        let h = Harness::with_service(ClassDef::concrete("Ids").method(
            MethodDef::new("insert")
                .param(ParamDef::named("ids", TypeRef::array(TypeRef::class("Long"))))
                .returns(greeting()),
        ));
        let insert = h.config("Ids", "insert");
        assert_eq!(
            insert.parameters[0].kind,
            ParameterKind::Scalar {
                scalar: ScalarKind::Int64,
                repeated: true
            }
        );
        assert_eq!(insert.parameters[0].location, ParameterLocation::Query);
    }

    #[test]
    fn test_array_of_arrays_is_a_nested_collection() {
        let h = Harness::with_service(ClassDef::concrete("Grid").method(
            MethodDef::new("insert")
                .param(ParamDef::named(
                    "ids",
                    TypeRef::array(TypeRef::array(TypeRef::class("Long"))),
                ))
                .returns(greeting()),
        ));
        let errors = h.errors("Grid", "insert");
        assert!(matches!(errors[0], ContractError::NestedCollection { ref parameter, .. } if parameter == "ids"));
    }

    #[test]
    fn test_unparseable_default_is_rejected() {
        let h = Harness::with_service(ClassDef::concrete("Flags").method(
            MethodDef::new("list")
                .param(
                    ParamDef::new(TypeRef::primitive(Primitive::Boolean))
                        .with_config(ParameterFragment::named("all").default_value("yes")),
                )
                .returns(TypeRef::generic("List", vec![greeting()])),
        ));
        let errors = h.errors("Flags", "list");
        assert!(matches!(errors[0], ContractError::InvalidDefaultValue { ref value, .. } if value == "yes"));
    }

    #[test]
    fn test_default_on_explicit_path_placeholder() {
        let h = Harness::with_service(ClassDef::concrete("Paged").method(
            MethodDef::new("page")
                .param(
                    ParamDef::new(TypeRef::primitive(Primitive::Int))
                        .with_config(ParameterFragment::named("n").default_value("1")),
                )
                .returns(greeting())
                .with_config(MethodFragment {
                    path: Some("pages/{n}".into()),
                    ..Default::default()
                }),
        ));
        let errors = h.errors("Paged", "page");
        assert!(matches!(errors[0], ContractError::DefaultOnPathParameter { .. }));
    }

    #[test]
    fn test_inference_never_places_optional_parameter_in_path() {
        let h = Harness::with_service(ClassDef::concrete("Paged").method(
            MethodDef::new("page")
                .param(
                    ParamDef::new(TypeRef::primitive(Primitive::Int))
                        .with_config(ParameterFragment::named("n").default_value("1")),
                )
                .returns(greeting()),
        ));
        let page = h.config("Paged", "page");
        assert_eq!(page.path, "page");
        assert_eq!(page.parameters[0].location, ParameterLocation::Query);
    }

    #[test]
    fn test_nullable_explicit_path_parameter() {
        let h = Harness::with_service(ClassDef::concrete("Paged").method(
            MethodDef::new("page")
                .param(
                    ParamDef::new(long()).with_config(ParameterFragment::named("id").nullable()),
                )
                .returns(greeting())
                .with_config(MethodFragment {
                    path: Some("/pages/{id}".into()),
                    ..Default::default()
                }),
        ));
        let errors = h.errors("Paged", "page");
        assert!(matches!(errors[0], ContractError::NullablePathParameter { .. }));
    }

    #[test]
    fn test_placeholder_must_name_a_scalar() {
        let h = Harness::with_service(ClassDef::concrete("Bad").method(
            MethodDef::new("save")
                .param(ParamDef::named("body", greeting()))
                .returns(greeting())
                .with_config(MethodFragment {
                    path: Some("save/{body}".into()),
                    ..Default::default()
                }),
        ));
        let errors = h.errors("Bad", "save");
        assert!(matches!(errors[0], ContractError::InvalidPath { .. }));
    }

    #[test]
    fn test_two_bodies_and_unnamed_scalar() {
        let h = Harness::with_service(
            ClassDef::concrete("Bad")
                .method(
                    MethodDef::new("merge")
                        .param(ParamDef::new(greeting()))
                        .param(ParamDef::new(TypeRef::class("Node")))
                        .returns(greeting()),
                )
                .method(
                    MethodDef::new("find")
                        .param(ParamDef::new(greeting()))
                        .param(ParamDef::new(long()))
                        .returns(greeting()),
                ),
        );
        let merge = h.errors("Bad", "merge");
        assert!(matches!(merge[0], ContractError::MissingParameterName { ref reason, .. } if reason.contains("more than one")));
        let find = h.errors("Bad", "find");
        assert!(matches!(find[0], ContractError::MissingParameterName { .. }));
    }

    #[test]
    fn test_duplicate_parameter_names() {
        let h = Harness::with_service(ClassDef::concrete("Dup").method(
            MethodDef::new("between")
                .param(ParamDef::named("at", long()))
                .param(ParamDef::named("at", long()))
                .returns(greeting()),
        ));
        let errors = h.errors("Dup", "between");
        assert!(matches!(errors[0], ContractError::DuplicateParameterName { ref parameter, .. } if parameter == "at"));
    }

    #[test]
    fn test_scalar_return_is_rejected() {
        let h = Harness::with_service(
            ClassDef::concrete("Echo").method(MethodDef::new("echo").returns(TypeRef::class("String"))),
        );
        let errors = h.errors("Echo", "echo");
        assert!(matches!(errors[0], ContractError::InvalidReturnType { .. }));
    }

    #[test]
    fn test_inference_disabled_requires_path_and_verb() {
        let h = Harness::with_service(
            ClassDef::concrete("Strict").method(MethodDef::new("list").returns(greeting())),
        );
        let errors = h.assemble_with("Strict", "list", false).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ContractError::MissingRestConfiguration { .. })));
    }

    #[test]
    fn test_ignored_method_yields_nothing() {
        let h = Harness::with_service(ClassDef::concrete("Quiet").method(
            MethodDef::new("hidden").with_config(MethodFragment {
                ignored: Some(true),
                ..Default::default()
            }),
        ));
        assert!(h.assemble("Quiet", "hidden").unwrap().is_none());
    }

    #[test]
    fn test_injected_and_unresolved_parameters_stay_off_the_wire() {
        let h = Harness::with_service(
            ClassDef::concrete("Generic")
                .type_param("T")
                .method(
                    MethodDef::new("store")
                        .param(ParamDef::new(TypeRef::class("User")))
                        .param(ParamDef::new(TypeRef::var("T")))
                        .param(ParamDef::named("id", long()))
                        .returns(greeting()),
                ),
        );
        let store = h.config("Generic", "store");
        assert_eq!(
            store.parameters[0].kind,
            ParameterKind::Injected {
                injected: InjectedKind::User
            }
        );
        assert_eq!(store.parameters[1].kind, ParameterKind::Unresolved);
        assert!(!store.parameters[1].is_wire());
        assert_eq!(store.path, "store/{id}");
        assert_eq!(store.wire_parameters().count(), 1);
    }
}
