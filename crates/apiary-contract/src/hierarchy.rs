//! Service class hierarchy flattening.
//!
//! [`HierarchyReader`] walks a concrete service class and its superclasses
//! once and produces one [`OverrideChain`] per resolved signature. Later
//! stages work from these chains and never walk the classes again.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use apiary_core::{ClassDef, ClassIndex, ContractError, ROOT_CLASS};

use crate::resolver::{MethodSignatureResolver, ResolvedMethod, SignatureKey};

/// Declarations sharing one resolved signature, most-derived first.
#[derive(Debug, Clone)]
pub struct OverrideChain {
    /// Shared signature.
    pub key: SignatureKey,
    /// Leaf at index 0, then overridden ancestors.
    pub methods: Vec<ResolvedMethod>,
}

impl OverrideChain {
    /// The declaration used for dispatch.
    #[must_use]
    pub fn leaf(&self) -> &ResolvedMethod {
        &self.methods[0]
    }

    /// Overridden declarations, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> &[ResolvedMethod] {
        &self.methods[1..]
    }
}

/// A flattened service class.
#[derive(Debug, Clone)]
pub struct ServiceHierarchy {
    /// The concrete service class.
    pub class: Arc<ClassDef>,
    /// The class and its superclasses, most-derived first, excluding the root.
    pub lineage: Vec<Arc<ClassDef>>,
    /// Override chains in discovery order.
    pub chains: IndexMap<SignatureKey, OverrideChain>,
}

impl ServiceHierarchy {
    /// Chains whose leaf has the given source name.
    pub fn chains_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a OverrideChain> {
        self.chains.values().filter(move |c| c.key.name == name)
    }
}

/// Flattens service classes into override chains.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyReader<'a> {
    classes: &'a ClassIndex,
    resolver: MethodSignatureResolver<'a>,
}

impl<'a> HierarchyReader<'a> {
    /// Creates a reader over `classes`.
    #[must_use]
    pub fn new(classes: &'a ClassIndex) -> Self {
        Self {
            classes,
            resolver: MethodSignatureResolver::new(classes),
        }
    }

    /// Reads the service class `name`.
    ///
    /// Every resolution failure in the hierarchy is reported, not just the
    /// first.
    pub fn read(&self, name: &str) -> Result<ServiceHierarchy, Vec<ContractError>> {
        let class = self.classes.get(name).ok_or_else(|| {
            vec![ContractError::UnknownClass {
                name: name.to_string(),
                referenced_by: "service registration".to_string(),
            }]
        })?;
        if !class.is_concrete() {
            return Err(vec![ContractError::InvalidServiceClass {
                class: name.to_string(),
                reason: format!("{:?} classes cannot be instantiated", class.kind),
            }]);
        }

        let lineage = self.classes.superclass_chain(name);
        let mut errors = Vec::new();
        if let Some(last) = lineage.last() {
            if let Some(missing) = last
                .superclass_name()
                .filter(|s| *s != ROOT_CLASS && !self.classes.contains(s))
            {
                errors.push(ContractError::UnknownClass {
                    name: missing.to_string(),
                    referenced_by: last.name.clone(),
                });
            }
        }

        let mut chains: IndexMap<SignatureKey, OverrideChain> = IndexMap::new();
        for declaring in &lineage {
            for (index, method) in declaring.methods.iter().enumerate() {
                if !method.is_eligible() {
                    continue;
                }
                match self.resolver.resolve(class, declaring, index) {
                    Ok(resolved) => {
                        chains
                            .entry(resolved.key.clone())
                            .or_insert_with(|| OverrideChain {
                                key: resolved.key.clone(),
                                methods: Vec::new(),
                            })
                            .methods
                            .push(resolved);
                    }
                    Err(e) => errors.push(e),
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        debug!(
            service = %name,
            classes = lineage.len(),
            chains = chains.len(),
            "Read service hierarchy"
        );

        Ok(ServiceHierarchy {
            class: Arc::clone(class),
            lineage,
            chains,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::{fixtures, MethodDef, ParamDef, Primitive, TypeRef};

    #[test]
    fn test_inherited_method_without_redeclaration() {
        let classes = fixtures::generic_hierarchy();
        let hierarchy = HierarchyReader::new(&classes).read("Leaf").unwrap();

        assert_eq!(hierarchy.chains.len(), 2);
        let get = hierarchy.chains_named("get").next().unwrap();
        assert_eq!(get.methods.len(), 1);
        assert_eq!(get.leaf().declaring.name, "Base");
        assert_eq!(get.leaf().returns, TypeRef::class("String"));
    }

    #[test]
    fn test_override_of_generic_method_joins_the_chain() {
        let classes = fixtures::generic_hierarchy().with(
            ClassDef::concrete("Override")
                .extends(TypeRef::generic("Base", vec![TypeRef::class("String")]))
                .method(
                    MethodDef::new("get")
                        .param(ParamDef::named("id", TypeRef::primitive(Primitive::Long)))
                        .returns(TypeRef::class("String")),
                ),
        );
        let hierarchy = HierarchyReader::new(&classes).read("Override").unwrap();
        let get = hierarchy.chains_named("get").next().unwrap();

        let declaring: Vec<_> = get.methods.iter().map(|m| m.declaring.name.as_str()).collect();
        assert_eq!(declaring, vec!["Override", "Base"]);
        assert!(!get.leaf().same_declaration(&get.ancestors()[0]));
    }

    #[test]
    fn test_bridge_static_and_restricted_methods_are_skipped() {
        let classes = ClassIndex::new().with(
            ClassDef::concrete("Svc")
                .method(MethodDef::new("visible"))
                .method(MethodDef::new("visible").bridge())
                .method(MethodDef::new("factory").static_method())
                .method(MethodDef::new("helper").restricted()),
        );
        let hierarchy = HierarchyReader::new(&classes).read("Svc").unwrap();
        let names: Vec<_> = hierarchy.chains.keys().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["visible"]);
        assert_eq!(hierarchy.chains[0].methods.len(), 1);
    }

    #[test]
    fn test_abstract_service_is_rejected() {
        let classes = fixtures::generic_hierarchy();
        let errors = HierarchyReader::new(&classes).read("Base").unwrap_err();
        assert!(matches!(errors[0], ContractError::InvalidServiceClass { .. }));
    }

    #[test]
    fn test_missing_superclass_is_reported() {
        let classes =
            ClassIndex::new().with(ClassDef::concrete("Orphan").extends(TypeRef::class("Ghost")));
        let errors = HierarchyReader::new(&classes).read("Orphan").unwrap_err();
        assert!(matches!(
            errors[0],
            ContractError::UnknownClass { ref name, .. } if name == "Ghost"
        ));
    }

    #[test]
    fn test_all_wildcard_errors_are_collected() {
        let wild = TypeRef::generic("List", vec![TypeRef::wildcard_extends(TypeRef::class("Long"))]);
        let classes = ClassIndex::new().with(
            ClassDef::concrete("Svc")
                .method(MethodDef::new("a").param(ParamDef::named("x", wild.clone())))
                .method(MethodDef::new("b").returns(wild)),
        );
        let errors = HierarchyReader::new(&classes).read("Svc").unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
