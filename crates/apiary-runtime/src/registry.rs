//! The live service registry.
//!
//! Every registration change builds a complete [`RegistrySnapshot`] (routing
//! table plus method targets) and publishes it with one atomic pointer swap.
//! A dispatch loads one snapshot and uses it for the whole request, so it
//! sees either the old or the new configuration of a method, never a mix.

use arc_swap::ArcSwap;
use http::Method;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use apiary_contract::{ApiContract, ApiMetadata, MethodConfig};
use apiary_core::ServiceInstance;
use apiary_router::{Params, Router};

use crate::error::RegistryError;

/// One registered service class.
pub struct Registration {
    /// Service class name.
    pub service_class: String,
    /// Contract the methods come from.
    pub contract: Arc<ApiContract>,
    /// Methods dispatched on this class.
    pub methods: Vec<Arc<MethodConfig>>,
    /// The live instance.
    pub instance: ServiceInstance,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("service_class", &self.service_class)
            .field("api", &self.contract.key())
            .field(
                "methods",
                &self
                    .methods
                    .iter()
                    .map(|m| m.canonical_name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Registration {
    fn new(
        contract: &Arc<ApiContract>,
        service_class: &str,
        instance: ServiceInstance,
    ) -> Result<Self, RegistryError> {
        let methods: Vec<_> = contract.methods_of(service_class).cloned().collect();
        if methods.is_empty() {
            let (api, version) = contract.key();
            return Err(RegistryError::NoMethods {
                service: service_class.to_string(),
                api: api.to_string(),
                version: version.to_string(),
            });
        }
        if let Some(unbound) = methods.iter().find(|m| m.invoker.is_none()) {
            return Err(RegistryError::MissingInvoker {
                method: unbound.canonical_name.clone(),
            });
        }
        Ok(Self {
            service_class: service_class.to_string(),
            contract: Arc::clone(contract),
            methods,
            instance,
        })
    }
}

/// A method resolved from a verb and path.
#[derive(Debug, Clone)]
pub struct RouteTarget {
    /// The method.
    pub config: Arc<MethodConfig>,
    /// The registration that owns it.
    pub registration: Arc<Registration>,
}

/// One immutable generation of the registry.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    router: Router,
    registrations: IndexMap<String, Arc<Registration>>,
    targets: HashMap<String, RouteTarget>,
}

impl RegistrySnapshot {
    fn build(
        base_path: &str,
        registrations: IndexMap<String, Arc<Registration>>,
    ) -> Result<Self, RegistryError> {
        let mut router = Router::new();
        let mut targets: HashMap<String, RouteTarget> = HashMap::new();
        let mut apis: HashMap<(&str, &str), &ApiMetadata> = HashMap::new();
        for registration in registrations.values() {
            let (api, version) = registration.contract.key();
            let metadata = &registration.contract.metadata;
            if apis
                .insert((api, version), metadata)
                .is_some_and(|seen| seen != metadata)
            {
                return Err(RegistryError::InconsistentApi {
                    service: registration.service_class.clone(),
                    api: api.to_string(),
                    version: version.to_string(),
                });
            }
            for method in &registration.methods {
                let target = format!("{api}/{version}/{}", method.canonical_name);
                if let Some(owner) = targets.get(&target) {
                    return Err(RegistryError::DuplicateMethod {
                        api: api.to_string(),
                        version: version.to_string(),
                        method: method.canonical_name.clone(),
                        first: owner.registration.service_class.clone(),
                        second: registration.service_class.clone(),
                    });
                }
                let template = mount_path(base_path, api, version, &method.path);
                router.insert(method.http_method.clone(), &template, target.clone())?;
                targets.insert(
                    target,
                    RouteTarget {
                        config: Arc::clone(method),
                        registration: Arc::clone(registration),
                    },
                );
            }
        }
        Ok(Self {
            router,
            registrations,
            targets,
        })
    }

    /// Resolves a verb and path.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<(RouteTarget, Params)> {
        let found = self.router.match_route(method, path)?;
        let target = self.targets.get(found.target)?;
        Some((target.clone(), found.params))
    }

    /// The method `method_name` served by `service_class`.
    ///
    /// `method_name` is either the declared method name or the canonical
    /// name.
    #[must_use]
    pub fn method(&self, service_class: &str, method_name: &str) -> Option<RouteTarget> {
        let registration = self.registrations.get(service_class)?;
        let config = registration
            .methods
            .iter()
            .find(|m| m.method.method == method_name || m.canonical_name == method_name)?;
        Some(RouteTarget {
            config: Arc::clone(config),
            registration: Arc::clone(registration),
        })
    }

    /// The registration of `service_class`.
    #[must_use]
    pub fn registration(&self, service_class: &str) -> Option<&Arc<Registration>> {
        self.registrations.get(service_class)
    }

    /// Number of routed methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Full route template of a method: `{base}/{api}/{version}/{path}`.
#[must_use]
pub fn mount_path(base_path: &str, api: &str, version: &str, path: &str) -> String {
    let mut out = String::from("/");
    let segments = [base_path, api, version, path]
        .into_iter()
        .flat_map(|part| part.split('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    out.push_str(&segments.join("/"));
    out
}

/// Service instances and their routed methods.
///
/// Reads are lock-free. Writers build a new snapshot and publish it with a
/// compare-and-swap, retrying if another writer got there first.
///
/// # Example
///
/// ```
/// use apiary_contract::ContractBuilder;
/// use apiary_core::fixtures::{self, GreetingStore};
/// use apiary_runtime::ServiceRegistry;
/// use http::Method;
/// use std::sync::Arc;
///
/// let contracts = ContractBuilder::new(fixtures::greeting_index())
///     .service("GreetingService")
///     .build()
///     .unwrap();
/// let api = contracts.get("greetings", "v1").unwrap();
///
/// let registry = ServiceRegistry::new("/_api");
/// registry
///     .register(api, "GreetingService", Arc::new(GreetingStore::default()))
///     .unwrap();
///
/// let snapshot = registry.snapshot();
/// let (target, params) = snapshot
///     .route(&Method::GET, "/_api/greetings/v1/greeting/get/7")
///     .unwrap();
/// assert_eq!(target.config.canonical_name, "greetings.greeting.get");
/// assert_eq!(params.get("id"), Some("7"));
/// ```
pub struct ServiceRegistry {
    base_path: String,
    current: ArcSwap<RegistrySnapshot>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("base_path", &self.base_path)
            .field("methods", &self.current.load().len())
            .finish()
    }
}

impl ServiceRegistry {
    /// Creates an empty registry mounting APIs under `base_path`.
    #[must_use]
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            current: ArcSwap::from_pointee(RegistrySnapshot::default()),
        }
    }

    /// Path prefix APIs are mounted under.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// Registers `instance` for the methods `contract` dispatches on
    /// `service_class`.
    ///
    /// Services of one API version must agree on its settings and may not
    /// share a canonical method name or a verb and path.
    pub fn register(
        &self,
        contract: &Arc<ApiContract>,
        service_class: &str,
        instance: ServiceInstance,
    ) -> Result<Arc<Registration>, RegistryError> {
        let registration = Arc::new(Registration::new(contract, service_class, instance)?);
        self.publish(|current| {
            if current.registrations.contains_key(service_class) {
                return Err(RegistryError::AlreadyRegistered {
                    service: service_class.to_string(),
                });
            }
            let mut next = current.registrations.clone();
            next.insert(service_class.to_string(), Arc::clone(&registration));
            Ok(next)
        })?;
        info!(
            service = service_class,
            methods = registration.methods.len(),
            "Registered service"
        );
        Ok(registration)
    }

    /// Replaces `old` with a registration built from `contract`, but only
    /// if `old` is still the live registration of its class.
    ///
    /// Fails with [`RegistryError::Stale`] when another writer replaced or
    /// removed it first.
    pub fn replace(
        &self,
        old: &Arc<Registration>,
        contract: &Arc<ApiContract>,
        instance: ServiceInstance,
    ) -> Result<Arc<Registration>, RegistryError> {
        let service_class = old.service_class.as_str();
        let registration = Arc::new(Registration::new(contract, service_class, instance)?);
        let result = self.publish(|current| {
            match current.registrations.get(service_class) {
                Some(live) if Arc::ptr_eq(live, old) => {}
                _ => {
                    return Err(RegistryError::Stale {
                        service: service_class.to_string(),
                    })
                }
            }
            let mut next = current.registrations.clone();
            next.insert(service_class.to_string(), Arc::clone(&registration));
            Ok(next)
        });
        apiary_telemetry::metrics::record_registry_swap(result.is_ok());
        result?;
        info!(service = service_class, "Replaced service registration");
        Ok(registration)
    }

    /// Removes the registration of `service_class`.
    pub fn deregister(&self, service_class: &str) -> Result<(), RegistryError> {
        self.publish(|current| {
            if !current.registrations.contains_key(service_class) {
                return Err(RegistryError::NotRegistered {
                    service: service_class.to_string(),
                });
            }
            let mut next = current.registrations.clone();
            next.shift_remove(service_class);
            Ok(next)
        })?;
        info!(service = service_class, "Deregistered service");
        Ok(())
    }

    /// Live `(canonical name, verb, full path template)` triples.
    #[must_use]
    pub fn methods(&self) -> Vec<(String, Method, String)> {
        let snapshot = self.current.load();
        snapshot
            .registrations
            .values()
            .flat_map(|registration| {
                let (api, version) = registration.contract.key();
                registration.methods.iter().map(move |m| {
                    (
                        m.canonical_name.clone(),
                        m.http_method.clone(),
                        mount_path(&self.base_path, api, version, &m.path),
                    )
                })
            })
            .collect()
    }

    fn publish<F>(&self, mut change: F) -> Result<(), RegistryError>
    where
        F: FnMut(&RegistrySnapshot) -> Result<IndexMap<String, Arc<Registration>>, RegistryError>,
    {
        loop {
            let current = self.current.load_full();
            let registrations = change(&current)?;
            let next = Arc::new(RegistrySnapshot::build(&self.base_path, registrations)?);
            let routes = next.len();
            let previous = self.current.compare_and_swap(&current, next);
            if Arc::ptr_eq(&*previous, &current) {
                debug!(routes, "Published registry snapshot");
                return Ok(());
            }
            warn!("Registry changed during update, retrying");
        }
    }
}
