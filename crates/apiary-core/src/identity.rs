//! Authenticated caller identity.

use serde::{Deserialize, Serialize};

/// The end user an authenticator vouched for.
///
/// # Example
///
/// ```
/// use apiary_core::Identity;
///
/// let alice = Identity::new("u-1")
///     .with_email("alice@example.com")
///     .with_scopes(["greetings.read"]);
/// assert_eq!(alice.log_id(), "user:u-1");
/// assert!(alice.has_any_scope(&["greetings.read".to_string()]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id.
    pub id: String,
    /// Email address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Granted OAuth scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Token audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Client the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Identity {
    /// Creates an identity with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the granted scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Sets the client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Identifier safe to log. Never includes credentials.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!("user:{}", self.id)
    }

    /// `true` if `required` is empty or any listed scope was granted.
    #[must_use]
    pub fn has_any_scope(&self, required: &[String]) -> bool {
        required.is_empty() || required.iter().any(|s| self.scopes.contains(s))
    }

    /// `true` if `allowed` is empty or contains the token audience.
    #[must_use]
    pub fn matches_audience(&self, allowed: &[String]) -> bool {
        allowed.is_empty()
            || self
                .audience
                .as_ref()
                .is_some_and(|aud| allowed.contains(aud))
    }

    /// `true` if `allowed` is empty or contains the client id.
    #[must_use]
    pub fn matches_client_id(&self, allowed: &[String]) -> bool {
        allowed.is_empty()
            || self
                .client_id
                .as_ref()
                .is_some_and(|id| allowed.contains(id))
    }
}
