//! Layered configuration merge.
//!
//! Every configuration source is converted into a [`SettingsLayer`] whose
//! fields are all optional. Layers are merged field by field in priority
//! order; the first layer that sets a field wins, independently of every
//! other field.

use http::Method;

use apiary_core::{
    ApiFragment, AuthLevel, ClassFragment, MethodFragment, ParamDef, ParameterFragment,
};

use crate::hierarchy::{OverrideChain, ServiceHierarchy};

/// One partial layer of method settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsLayer {
    /// Wire method name.
    pub name: Option<String>,
    /// Path template.
    pub path: Option<String>,
    /// HTTP verb.
    pub http_method: Option<Method>,
    /// Method description.
    pub description: Option<String>,
    /// Resource segment of canonical names and inferred paths.
    pub resource: Option<String>,
    /// Authentication level.
    pub auth_level: Option<AuthLevel>,
    /// Accepted scopes.
    pub scopes: Option<Vec<String>>,
    /// Accepted audiences.
    pub audiences: Option<Vec<String>>,
    /// Accepted client ids.
    pub client_ids: Option<Vec<String>>,
    /// User authenticator chain.
    pub authenticators: Option<Vec<String>>,
    /// Peer authenticator chain.
    pub peer_authenticators: Option<Vec<String>>,
    /// Excluded from the contract.
    pub ignored: Option<bool>,
}

impl From<&MethodFragment> for SettingsLayer {
    fn from(f: &MethodFragment) -> Self {
        Self {
            name: f.name.clone(),
            path: f.path.clone(),
            http_method: f.http_method.clone(),
            description: f.description.clone(),
            resource: None,
            auth_level: f.auth_level,
            scopes: f.scopes.clone(),
            audiences: f.audiences.clone(),
            client_ids: f.client_ids.clone(),
            authenticators: f.authenticators.clone(),
            peer_authenticators: f.peer_authenticators.clone(),
            ignored: f.ignored,
        }
    }
}

impl From<&ClassFragment> for SettingsLayer {
    fn from(f: &ClassFragment) -> Self {
        Self {
            resource: f.resource.clone(),
            auth_level: f.auth_level,
            scopes: f.scopes.clone(),
            audiences: f.audiences.clone(),
            client_ids: f.client_ids.clone(),
            authenticators: f.authenticators.clone(),
            peer_authenticators: f.peer_authenticators.clone(),
            ..Self::default()
        }
    }
}

// The API description documents the API, not each method.
impl From<&ApiFragment> for SettingsLayer {
    fn from(f: &ApiFragment) -> Self {
        Self {
            auth_level: f.auth_level,
            scopes: f.scopes.clone(),
            audiences: f.audiences.clone(),
            client_ids: f.client_ids.clone(),
            authenticators: f.authenticators.clone(),
            peer_authenticators: f.peer_authenticators.clone(),
            ..Self::default()
        }
    }
}

impl SettingsLayer {
    /// Fills every unset field of `self` from `lower`.
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            name: self.name.or(lower.name),
            path: self.path.or(lower.path),
            http_method: self.http_method.or(lower.http_method),
            description: self.description.or(lower.description),
            resource: self.resource.or(lower.resource),
            auth_level: self.auth_level.or(lower.auth_level),
            scopes: self.scopes.or(lower.scopes),
            audiences: self.audiences.or(lower.audiences),
            client_ids: self.client_ids.or(lower.client_ids),
            authenticators: self.authenticators.or(lower.authenticators),
            peer_authenticators: self.peer_authenticators.or(lower.peer_authenticators),
            ignored: self.ignored.or(lower.ignored),
        }
    }

    /// Applies system defaults to whatever is still unset.
    #[must_use]
    pub fn resolve(self) -> MethodSettings {
        MethodSettings {
            name: self.name,
            path: self.path,
            http_method: self.http_method,
            description: self.description,
            resource: self.resource,
            auth_level: self.auth_level.unwrap_or_default(),
            scopes: self.scopes.unwrap_or_default(),
            audiences: self.audiences.unwrap_or_default(),
            client_ids: self.client_ids.unwrap_or_default(),
            authenticators: self.authenticators.unwrap_or_default(),
            peer_authenticators: self.peer_authenticators.unwrap_or_default(),
            ignored: self.ignored.unwrap_or(false),
        }
    }
}

/// Merges layers given highest priority first.
///
/// # Example
///
/// ```
/// use apiary_contract::{merge_layers, SettingsLayer};
/// use apiary_core::AuthLevel;
///
/// let method = SettingsLayer { scopes: Some(vec!["write".into()]), ..Default::default() };
/// let class = SettingsLayer {
///     scopes: Some(vec!["read".into()]),
///     auth_level: Some(AuthLevel::Required),
///     ..Default::default()
/// };
///
/// let merged = merge_layers([method, class]).resolve();
/// assert_eq!(merged.scopes, vec!["write".to_string()]);
/// assert_eq!(merged.auth_level, AuthLevel::Required);
/// ```
pub fn merge_layers<I>(layers: I) -> SettingsLayer
where
    I: IntoIterator<Item = SettingsLayer>,
{
    layers
        .into_iter()
        .fold(SettingsLayer::default(), SettingsLayer::or)
}

/// Method settings after merging and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSettings {
    /// Explicit wire name.
    pub name: Option<String>,
    /// Explicit path template.
    pub path: Option<String>,
    /// Explicit verb.
    pub http_method: Option<Method>,
    /// Description.
    pub description: Option<String>,
    /// Resource segment.
    pub resource: Option<String>,
    /// Authentication level.
    pub auth_level: AuthLevel,
    /// Accepted scopes.
    pub scopes: Vec<String>,
    /// Accepted audiences.
    pub audiences: Vec<String>,
    /// Accepted client ids.
    pub client_ids: Vec<String>,
    /// User authenticator chain.
    pub authenticators: Vec<String>,
    /// Peer authenticator chain.
    pub peer_authenticators: Vec<String>,
    /// Excluded from the contract.
    pub ignored: bool,
}

/// Priority-ordered layers for one override chain: leaf method, ancestor
/// methods, then class and API fragments along the service lineage.
#[must_use]
pub fn method_layers(chain: &OverrideChain, hierarchy: &ServiceHierarchy) -> Vec<SettingsLayer> {
    let methods = chain
        .methods
        .iter()
        .map(|m| SettingsLayer::from(&m.method().config));
    let classes = hierarchy
        .lineage
        .iter()
        .map(|c| SettingsLayer::from(&c.config));
    let apis = hierarchy
        .lineage
        .iter()
        .filter_map(|c| c.api.as_ref())
        .map(SettingsLayer::from);
    methods.chain(classes).chain(apis).collect()
}

/// Merged settings for one method.
#[must_use]
pub fn merge_method(chain: &OverrideChain, hierarchy: &ServiceHierarchy) -> MethodSettings {
    merge_layers(method_layers(chain, hierarchy)).resolve()
}

/// Merges the configuration of parameter `position` across the chain.
///
/// Scalar fields merge first-set-wins; the transformer list is taken from
/// the first declaration that lists any.
#[must_use]
pub fn merge_parameter(chain: &OverrideChain, position: usize) -> ParameterFragment {
    let configs: Vec<&ParameterFragment> = chain
        .methods
        .iter()
        .filter_map(|m| m.method().params.get(position))
        .map(|p: &ParamDef| &p.config)
        .collect();

    ParameterFragment {
        name: configs.iter().find_map(|c| c.name.clone()),
        nullable: configs.iter().find_map(|c| c.nullable),
        default_value: configs.iter().find_map(|c| c.default_value.clone()),
        transformers: configs
            .iter()
            .find(|c| !c.transformers.is_empty())
            .map(|c| c.transformers.clone())
            .unwrap_or_default(),
    }
}
