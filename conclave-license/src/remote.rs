//! Collaborator interfaces: identity provider and remote entitlement store.

use crate::error::{LicenseError, LicenseResult};
use crate::status::EntitlementStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The account returned by a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Provider-specific subject identifier.
    pub uid: String,
    /// Verified email address, if the provider vouches for one.
    pub email: Option<String>,
    /// Display name, informational only.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Account {
    /// Creates an account with a verified email.
    pub fn with_email(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: Some(email.into()),
            display_name: None,
        }
    }
}

/// Result of an interactive sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    /// The user signed in.
    SignedIn(Account),
    /// The user backed out of the flow.
    Cancelled,
}

/// Identifier under which the remote authority files a user's record.
///
/// Derived from the verified email, trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Derives the user id from a signed-in account.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidUserIdentity`] if the account has no
    /// usable email.
    pub fn from_account(account: &Account) -> LicenseResult<Self> {
        let email = account.email.as_deref().unwrap_or_default();
        if email.trim().is_empty() {
            return Err(LicenseError::InvalidUserIdentity(format!(
                "account {} has no verified email",
                account.uid
            )));
        }
        Self::parse(email)
    }

    /// Validates and normalizes a raw email into a user id.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidUserIdentity`] if `raw` does not look
    /// like an email or cannot be used as a single path segment.
    pub fn parse(raw: &str) -> LicenseResult<Self> {
        let email = raw.trim();
        let usable = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !usable || email.contains('/') || email.chars().any(char::is_whitespace) {
            return Err(LicenseError::InvalidUserIdentity(format!(
                "unusable email {email:?}"
            )));
        }
        Ok(Self(email.to_lowercase()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A per-user record held by the remote authority.
///
/// `status` is kept untyped; decode it with
/// [`EntitlementStatus::from_remote`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Raw status field.
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    /// When the record was first requested (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<String>,
    /// When the authority last changed the status (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<String>,
}

impl EntitlementRecord {
    /// A fresh enrollment request.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: Some(serde_json::Value::String(
                EntitlementStatus::Pending.as_str().to_string(),
            )),
            requested_at: Some(chrono::Utc::now().to_rfc3339()),
            decided_at: None,
        }
    }

    /// A record carrying the given status.
    #[must_use]
    pub fn with_status(status: EntitlementStatus) -> Self {
        Self {
            status: Some(serde_json::Value::String(status.as_str().to_string())),
            requested_at: None,
            decided_at: None,
        }
    }

    /// Decodes the status field, failing closed.
    pub fn decode_status(&self) -> LicenseResult<EntitlementStatus> {
        EntitlementStatus::from_remote(self.status.as_ref())
    }
}

/// Interactive sign-in yielding a verified account.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the name of the identity provider.
    fn provider_name(&self) -> &'static str;

    /// Runs the sign-in flow.
    ///
    /// User cancellation is `Ok(SignIn::Cancelled)`, not an error.
    async fn sign_in(&self) -> LicenseResult<SignIn>;
}

/// Keyed store of per-user entitlement records.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Returns the name of the store backend.
    fn store_name(&self) -> &'static str;

    /// Fetches the record for `(app_id, user)`, `None` if absent.
    async fn get(&self, app_id: &str, user: &UserId) -> LicenseResult<Option<EntitlementRecord>>;

    /// Writes the record for `(app_id, user)`.
    async fn put(
        &self,
        app_id: &str,
        user: &UserId,
        record: &EntitlementRecord,
    ) -> LicenseResult<()>;
}
