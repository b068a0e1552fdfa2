//! In-process collaborators for development and tests.

use async_trait::async_trait;
use conclave_license::{
    Account, EntitlementRecord, EntitlementStatus, EntitlementStore, IdentityProvider,
    LicenseResult, SignIn, UserId,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Entitlement store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryEntitlementStore {
    records: RwLock<HashMap<(String, UserId), EntitlementRecord>>,
}

impl MemoryEntitlementStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status of a record, creating it if needed.
    pub async fn decide(&self, app_id: &str, user: &UserId, status: EntitlementStatus) {
        let mut records = self.records.write().await;
        let record = records
            .entry((app_id.to_string(), user.clone()))
            .or_insert_with(|| EntitlementRecord::with_status(status));
        record.status = Some(serde_json::Value::String(status.as_str().to_string()));
        record.decided_at = Some(chrono::Utc::now().to_rfc3339());
    }

    /// All records for `app_id`, sorted by user.
    pub async fn list(&self, app_id: &str) -> Vec<(UserId, EntitlementRecord)> {
        let records = self.records.read().await;
        let mut out: Vec<_> = records
            .iter()
            .filter(|((app, _), _)| app == app_id)
            .map(|((_, user), record)| (user.clone(), record.clone()))
            .collect();
        out.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        out
    }

    /// Number of records across all applications.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EntitlementStore for MemoryEntitlementStore {
    fn store_name(&self) -> &'static str {
        "Memory"
    }

    async fn get(&self, app_id: &str, user: &UserId) -> LicenseResult<Option<EntitlementRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&(app_id.to_string(), user.clone())).cloned())
    }

    async fn put(
        &self,
        app_id: &str,
        user: &UserId,
        record: &EntitlementRecord,
    ) -> LicenseResult<()> {
        let mut records = self.records.write().await;
        records.insert((app_id.to_string(), user.clone()), record.clone());
        Ok(())
    }
}

/// Identity provider with a predetermined answer.
#[derive(Debug, Clone)]
pub struct FixedIdentity {
    account: Option<Account>,
}

impl FixedIdentity {
    /// Always signs in as `email`.
    pub fn email(email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            account: Some(Account::with_email(format!("fixed:{email}"), email)),
        }
    }

    /// Always signs in as `account`.
    #[must_use]
    pub fn account(account: Account) -> Self {
        Self {
            account: Some(account),
        }
    }

    /// Always reports a cancelled sign-in.
    #[must_use]
    pub fn cancelling() -> Self {
        Self { account: None }
    }
}

#[async_trait]
impl IdentityProvider for FixedIdentity {
    fn provider_name(&self) -> &'static str {
        "Fixed"
    }

    async fn sign_in(&self) -> LicenseResult<SignIn> {
        Ok(match &self.account {
            Some(account) => SignIn::SignedIn(account.clone()),
            None => SignIn::Cancelled,
        })
    }
}
