//! Process-wide cache of remote service handles.
//!
//! A handle is created the first time its name is requested and reused for
//! the rest of the process. Later initializers for the same name are ignored.

use crate::error::{LicenseError, LicenseResult};
use crate::remote::{EntitlementStore, IdentityProvider};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

/// A named pair of collaborators used by the sync protocol.
pub struct RemoteService {
    name: String,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn EntitlementStore>,
}

impl RemoteService {
    /// Bundles an identity provider and an entitlement store under `name`.
    pub fn new(
        name: impl Into<String>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn EntitlementStore>,
    ) -> Self {
        Self {
            name: name.into(),
            identity,
            store,
        }
    }

    /// The name this service is cached under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity provider.
    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// The entitlement store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntitlementStore> {
        &self.store
    }
}

impl fmt::Debug for RemoteService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteService")
            .field("name", &self.name)
            .field("identity", &self.identity.provider_name())
            .field("store", &self.store.store_name())
            .finish()
    }
}

/// Builds a service, given the name it will be cached under.
pub type ServiceInit = Arc<dyn Fn(&str) -> LicenseResult<RemoteService> + Send + Sync>;

fn services() -> &'static Mutex<HashMap<String, Arc<RemoteService>>> {
    static SERVICES: OnceLock<Mutex<HashMap<String, Arc<RemoteService>>>> = OnceLock::new();
    SERVICES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the service cached under `name`, creating it with `init` if absent.
///
/// `init` runs under the registry lock, at most once per name. If it fails,
/// nothing is cached and the next call tries again.
pub fn get_or_init<F>(name: &str, init: F) -> LicenseResult<Arc<RemoteService>>
where
    F: FnOnce() -> LicenseResult<RemoteService>,
{
    let mut map = services()
        .lock()
        .map_err(|_| LicenseError::RemoteUnavailable("service registry poisoned".to_string()))?;

    if let Some(existing) = map.get(name) {
        return Ok(existing.clone());
    }

    debug!("Initializing remote service {}", name);
    let service = Arc::new(init()?);
    map.insert(name.to_string(), service.clone());
    Ok(service)
}

/// Returns the service cached under `name`, if any.
#[must_use]
pub fn get(name: &str) -> Option<Arc<RemoteService>> {
    services().lock().ok()?.get(name).cloned()
}

/// Drops the cached service so the next request re-initializes it.
///
/// Returns true if a service was cached.
pub fn forget(name: &str) -> bool {
    services()
        .lock()
        .map(|mut map| map.remove(name).is_some())
        .unwrap_or(false)
}
