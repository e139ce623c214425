//! Contract build orchestration.
//!
//! [`ContractBuilder`] runs the whole pipeline for a set of service
//! classes: hierarchy reading, assembly, schema resolution and validation,
//! grouped per `(api, version)`. Either every contract is produced or the
//! build fails with the collected errors.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use apiary_core::{ApiFragment, ClassIndex, ContractError, ContractErrors, TypeCatalog};

use crate::assembler::ConfigAssembler;
use crate::contract::{ApiContract, ApiMetadata, ContractSet};
use crate::hierarchy::{HierarchyReader, ServiceHierarchy};
use crate::schema::SchemaRepository;
use crate::transform::TransformerRegistry;
use crate::validator::{AssembledService, ContractValidator};

/// Build policy switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Infer missing paths and verbs from method names.
    pub infer_rest_conventions: bool,
    /// Keep going after the first failing class.
    pub collect_all_errors: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            infer_rest_conventions: true,
            collect_all_errors: true,
        }
    }
}

/// Builds validated contracts from service classes.
///
/// # Example
///
/// ```
/// use apiary_contract::ContractBuilder;
/// use apiary_core::fixtures;
///
/// let contracts = ContractBuilder::new(fixtures::greeting_index())
///     .service("GreetingService")
///     .build()
///     .unwrap();
///
/// let api = contracts.get("greetings", "v1").unwrap();
/// assert!(api.method("greetings.greeting.get").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct ContractBuilder {
    classes: ClassIndex,
    catalog: TypeCatalog,
    transformers: TransformerRegistry,
    options: BuildOptions,
    services: Vec<String>,
}

type ApiKey = (String, String);

impl ContractBuilder {
    /// Creates a builder over `classes`.
    #[must_use]
    pub fn new(classes: ClassIndex) -> Self {
        Self {
            classes,
            catalog: TypeCatalog::new(),
            transformers: TransformerRegistry::new(),
            options: BuildOptions::default(),
            services: Vec::new(),
        }
    }

    /// Replaces the type catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replaces the transformer registry.
    #[must_use]
    pub fn with_transformers(mut self, transformers: TransformerRegistry) -> Self {
        self.transformers = transformers;
        self
    }

    /// Replaces the build options.
    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a service class.
    #[must_use]
    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.services.push(name.into());
        self
    }

    /// Adds several service classes.
    #[must_use]
    pub fn services<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.extend(names.into_iter().map(Into::into));
        self
    }

    /// The class index.
    #[must_use]
    pub fn classes(&self) -> &ClassIndex {
        &self.classes
    }

    /// Runs the build.
    pub fn build(&self) -> Result<ContractSet, ContractErrors> {
        let mut errors = Vec::new();
        let groups = self.read_services(&mut errors);
        if !errors.is_empty() && !self.options.collect_all_errors {
            return Err(ContractErrors(errors));
        }

        let mut contracts = ContractSet::default();
        for ((name, version), hierarchies) in groups {
            match self.build_api(hierarchies) {
                Ok(contract) => {
                    info!(
                        api = %name,
                        version = %version,
                        methods = contract.methods.len(),
                        schemas = contract.schemas.len(),
                        "Built API contract"
                    );
                    contracts.insert(contract);
                }
                Err(api_errors) => {
                    errors.extend(api_errors);
                    if !self.options.collect_all_errors {
                        break;
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(contracts)
        } else {
            warn!(errors = errors.len(), "Contract build failed");
            Err(ContractErrors(errors))
        }
    }

    fn read_services(
        &self,
        errors: &mut Vec<ContractError>,
    ) -> IndexMap<ApiKey, Vec<ServiceHierarchy>> {
        let reader = HierarchyReader::new(&self.classes);
        let mut groups: IndexMap<ApiKey, Vec<ServiceHierarchy>> = IndexMap::new();

        for name in &self.services {
            let hierarchy = match reader.read(name) {
                Ok(hierarchy) => hierarchy,
                Err(e) => {
                    errors.extend(e);
                    if self.options.collect_all_errors {
                        continue;
                    }
                    break;
                }
            };
            let key = hierarchy
                .lineage
                .iter()
                .find_map(|c| c.api.as_ref())
                .and_then(|api| Some((api.name.clone()?, api.version.clone()?)));
            match key {
                Some(key) => groups.entry(key).or_default().push(hierarchy),
                None => {
                    errors.push(ContractError::InvalidServiceClass {
                        class: name.clone(),
                        reason: "no API name and version configured".to_string(),
                    });
                    if !self.options.collect_all_errors {
                        break;
                    }
                }
            }
        }
        groups
    }

    fn build_api(&self, hierarchies: Vec<ServiceHierarchy>) -> Result<ApiContract, Vec<ContractError>> {
        let assembler = ConfigAssembler::new(&self.classes, &self.catalog, &self.transformers)
            .infer_rest_conventions(self.options.infer_rest_conventions);
        let mut schemas = SchemaRepository::new(&self.classes, &self.catalog, &self.transformers);
        let mut errors = Vec::new();
        let mut services = Vec::with_capacity(hierarchies.len());

        for hierarchy in hierarchies {
            let mut methods = Vec::new();
            let before = errors.len();
            for chain in hierarchy.chains.values() {
                match assembler.assemble(&hierarchy, chain, &mut schemas) {
                    Ok(Some(config)) => {
                        debug!(
                            method = %config.canonical_name,
                            verb = %config.http_method,
                            path = %config.path,
                            "Assembled method"
                        );
                        methods.push((chain.key.clone(), config));
                    }
                    Ok(None) => debug!(method = %chain.key, "Skipped ignored method"),
                    Err(e) => errors.extend(e),
                }
            }
            if errors.len() > before && !self.options.collect_all_errors {
                return Err(errors);
            }
            services.push(AssembledService { hierarchy, methods });
        }

        errors.extend(ContractValidator::new(&self.classes).validate(&services));
        if !errors.is_empty() {
            return Err(errors);
        }

        let metadata = metadata(services.iter().filter_map(AssembledService::api));
        let methods = services
            .into_iter()
            .flat_map(|s| s.methods)
            .map(|(_, config)| (config.canonical_name.clone(), Arc::new(config)))
            .collect();

        Ok(ApiContract {
            metadata,
            methods,
            schemas: schemas.into_types(),
        })
    }
}

/// Root metadata from the API fragments of a group, first set value wins.
fn metadata<'a>(fragments: impl Iterator<Item = &'a ApiFragment>) -> ApiMetadata {
    let merged = fragments.fold(ApiFragment::default(), |acc, f| ApiFragment {
        name: acc.name.or_else(|| f.name.clone()),
        version: acc.version.or_else(|| f.version.clone()),
        description: acc.description.or_else(|| f.description.clone()),
        auth_level: acc.auth_level.or(f.auth_level),
        scopes: acc.scopes.or_else(|| f.scopes.clone()),
        audiences: acc.audiences.or_else(|| f.audiences.clone()),
        client_ids: acc.client_ids.or_else(|| f.client_ids.clone()),
        authenticators: acc.authenticators.or_else(|| f.authenticators.clone()),
        peer_authenticators: acc.peer_authenticators.or_else(|| f.peer_authenticators.clone()),
        frontend_limits: acc.frontend_limits.or_else(|| f.frontend_limits.clone()),
        cache_control: acc.cache_control.or_else(|| f.cache_control.clone()),
        namespace: acc.namespace.or_else(|| f.namespace.clone()),
    });

    ApiMetadata {
        name: merged.name.unwrap_or_default(),
        version: merged.version.unwrap_or_default(),
        description: merged.description,
        auth_level: merged.auth_level.unwrap_or_default(),
        scopes: merged.scopes.unwrap_or_default(),
        audiences: merged.audiences.unwrap_or_default(),
        client_ids: merged.client_ids.unwrap_or_default(),
        frontend_limits: merged.frontend_limits,
        cache_control: merged.cache_control,
        namespace: merged.namespace,
    }
}
