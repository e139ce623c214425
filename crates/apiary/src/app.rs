//! Bootstrap: configuration, contract build, registry and dispatcher.

use bytes::Bytes;
use http::{Method, Request, Response};
use std::any::Any;
use std::sync::Arc;
use tracing::info;

use apiary_config::ApiaryConfig;
use apiary_contract::{ApiContract, BuildOptions, ContractBuilder, TransformerRegistry};
use apiary_core::{ClassDef, ClassIndex, ServiceInstance, TypeCatalog};
use apiary_runtime::{
    Authenticator, AuthenticatorSet, DispatchContext, PeerAuthenticator, Registration,
    RegistryError, RequestDispatcher, ServiceRegistry,
};

use crate::error::{ApiaryError, ApiaryResult};

/// A running set of APIs.
///
/// # Example
///
/// ```
/// use apiary::prelude::*;
/// use apiary_core::fixtures::{self, GreetingStore};
///
/// # tokio_test::block_on(async {
/// let apiary = Apiary::builder()
///     .classes(fixtures::greeting_index())
///     .service("GreetingService", GreetingStore::default())
///     .build()
///     .unwrap();
///
/// let mut ctx = DispatchContext::new(HeaderMap::new(), r#"{"message":"hi"}"#);
/// let handled = apiary
///     .dispatch(&Method::POST, "/_api/greetings/v1/greeting/insert", &mut ctx)
///     .await;
/// assert!(handled);
/// assert_eq!(ctx.response().unwrap().status, StatusCode::OK);
/// # });
/// ```
#[derive(Debug)]
pub struct Apiary {
    config: ApiaryConfig,
    catalog: TypeCatalog,
    transformers: TransformerRegistry,
    registry: Arc<ServiceRegistry>,
    dispatcher: Arc<RequestDispatcher>,
}

impl Apiary {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ApiaryBuilder {
        ApiaryBuilder::new()
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ApiaryConfig {
        &self.config
    }

    /// The live registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// The dispatcher, shareable with a transport.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    /// The contract currently serving `service_class`.
    #[must_use]
    pub fn contract(&self, service_class: &str) -> Option<Arc<ApiContract>> {
        self.registry
            .snapshot()
            .registration(service_class)
            .map(|r| Arc::clone(&r.contract))
    }

    /// Dispatches one request; see [`RequestDispatcher::dispatch`].
    pub async fn dispatch(&self, method: &Method, path: &str, ctx: &mut DispatchContext) -> bool {
        self.dispatcher.dispatch(method, path, ctx).await
    }

    /// Dispatches an `http::Request`; see [`RequestDispatcher::handle`].
    pub async fn handle(&self, request: Request<Bytes>) -> Option<Response<Bytes>> {
        self.dispatcher.handle(request).await
    }

    /// Rebuilds the contract of `service_class` from `classes` and swaps it
    /// in, together with `instance`.
    ///
    /// In-flight requests finish against the configuration they started
    /// with. Fails with [`RegistryError::Stale`] if another reload of the
    /// same class won the race; the registry is then left as that reload
    /// made it. The rebuilt contract is checked against every other live
    /// service: a colliding canonical name, verb and path, or disagreeing
    /// API settings leave the registry unchanged.
    pub fn reload(
        &self,
        classes: ClassIndex,
        service_class: &str,
        instance: ServiceInstance,
    ) -> ApiaryResult<Arc<Registration>> {
        let current = self
            .registry
            .snapshot()
            .registration(service_class)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered {
                service: service_class.to_string(),
            })?;
        let contracts = contract_builder(&self.config, &self.catalog, &self.transformers, classes)
            .service(service_class)
            .build()?;
        let contract = contracts
            .contract_of(service_class)
            .ok_or_else(|| ApiaryError::NoContract {
                service: service_class.to_string(),
            })?;
        Ok(self.registry.replace(&current, contract, instance)?)
    }
}

fn contract_builder(
    config: &ApiaryConfig,
    catalog: &TypeCatalog,
    transformers: &TransformerRegistry,
    classes: ClassIndex,
) -> ContractBuilder {
    ContractBuilder::new(classes)
        .with_catalog(catalog.clone())
        .with_transformers(transformers.clone())
        .with_options(BuildOptions {
            infer_rest_conventions: config.contract.infer_rest_conventions,
            collect_all_errors: config.contract.collect_all_errors,
        })
}

/// Builder for [`Apiary`].
#[derive(Debug, Default)]
pub struct ApiaryBuilder {
    config: ApiaryConfig,
    classes: ClassIndex,
    catalog: TypeCatalog,
    transformers: TransformerRegistry,
    services: Vec<(String, ServiceInstance)>,
    authenticators: AuthenticatorSet,
    telemetry: bool,
}

impl ApiaryBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: ApiaryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the classes services are read from.
    #[must_use]
    pub fn classes(mut self, classes: ClassIndex) -> Self {
        self.classes = classes;
        self
    }

    /// Adds or replaces one class.
    #[must_use]
    pub fn class(mut self, class: ClassDef) -> Self {
        self.classes.insert(class);
        self
    }

    /// Replaces the type catalog.
    #[must_use]
    pub fn catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replaces the transformer registry.
    #[must_use]
    pub fn transformers(mut self, transformers: TransformerRegistry) -> Self {
        self.transformers = transformers;
        self
    }

    /// Serves `service_class` with `instance`.
    #[must_use]
    pub fn service<S: Any + Send + Sync>(self, service_class: impl Into<String>, instance: S) -> Self {
        self.service_instance(service_class, Arc::new(instance))
    }

    /// Serves `service_class` with an already shared instance.
    #[must_use]
    pub fn service_instance(
        mut self,
        service_class: impl Into<String>,
        instance: ServiceInstance,
    ) -> Self {
        self.services.push((service_class.into(), instance));
        self
    }

    /// Adds a user authenticator.
    #[must_use]
    pub fn authenticator(
        mut self,
        name: impl Into<String>,
        authenticator: impl Authenticator + 'static,
    ) -> Self {
        self.authenticators = self.authenticators.with_authenticator(name, authenticator);
        self
    }

    /// Adds a peer authenticator.
    #[must_use]
    pub fn peer_authenticator(
        mut self,
        name: impl Into<String>,
        authenticator: impl PeerAuthenticator + 'static,
    ) -> Self {
        self.authenticators = self
            .authenticators
            .with_peer_authenticator(name, authenticator);
        self
    }

    /// Installs logging from the configuration when built.
    #[must_use]
    pub fn with_telemetry(mut self) -> Self {
        self.telemetry = true;
        self
    }

    /// Validates the configuration, builds every contract and registers
    /// the services.
    ///
    /// Nothing is served if any contract fails to build.
    pub fn build(self) -> ApiaryResult<Apiary> {
        self.config.validate()?;
        if self.telemetry {
            apiary_telemetry::init_telemetry(&self.config.telemetry.logging)?;
        }

        let contracts = contract_builder(
            &self.config,
            &self.catalog,
            &self.transformers,
            self.classes,
        )
        .services(self.services.iter().map(|(name, _)| name.clone()))
        .build()?;

        let registry = Arc::new(ServiceRegistry::new(self.config.dispatch.base_path.clone()));
        for (service_class, instance) in self.services {
            let contract =
                contracts
                    .contract_of(&service_class)
                    .ok_or_else(|| ApiaryError::NoContract {
                        service: service_class.clone(),
                    })?;
            registry.register(contract, &service_class, instance)?;
        }

        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&registry),
            self.authenticators,
            self.config.dispatch.clone(),
        ));
        info!(
            apis = contracts.len(),
            methods = registry.snapshot().len(),
            base_path = %self.config.dispatch.base_path,
            "Apiary ready"
        );

        Ok(Apiary {
            config: self.config,
            catalog: self.catalog,
            transformers: self.transformers,
            registry,
            dispatcher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_config::{ConfigError, DispatchConfig};
    use apiary_core::fixtures::{self, GreetingStore};

    #[test]
    fn test_build_registers_services() {
        let apiary = Apiary::builder()
            .classes(fixtures::greeting_index())
            .service("GreetingService", GreetingStore::default())
            .build()
            .unwrap();
        assert_eq!(apiary.registry().snapshot().len(), 5);
        let contract = apiary.contract("GreetingService").unwrap();
        assert_eq!(contract.key(), ("greetings", "v1"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ApiaryConfig::builder()
            .dispatch(DispatchConfig {
                base_path: "relative".to_string(),
                ..Default::default()
            })
            .build();
        let err = Apiary::builder().config(config).build().unwrap_err();
        assert!(matches!(
            err,
            ApiaryError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_service_fails_the_build() {
        let err = Apiary::builder()
            .classes(fixtures::greeting_index())
            .service("MissingService", GreetingStore::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, ApiaryError::Contract(_)));
    }

    #[test]
    fn test_reload_unregistered_class() {
        let apiary = Apiary::builder().build().unwrap();
        let err = apiary
            .reload(
                fixtures::greeting_index(),
                "GreetingService",
                Arc::new(GreetingStore::default()),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ApiaryError::Registry(RegistryError::NotRegistered { .. })
        ));
    }
}
