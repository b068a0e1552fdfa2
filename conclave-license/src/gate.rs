//! The entitlement gate.
//!
//! Owns three preference keys: the first-seen marker, the remaining trial
//! count and the status. Nothing else writes them.

use crate::config::GateConfig;
use crate::delivery::{Decision, DecisionCallback, Origin, PendingSlot, RequestToken};
use crate::error::{LicenseError, LicenseResult};
use crate::registry::{RemoteService, ServiceInit};
use crate::remote::{EntitlementStore, IdentityProvider};
use crate::status::EntitlementStatus;
use crate::trial;
use conclave_storage::{MemoryPreferences, PreferenceBackend, Preferences, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub(crate) const KEY_FIRST_SEEN: &str = "first_seen_marker";
pub(crate) const KEY_TRIAL_REMAINING: &str = "trial_remaining";
pub(crate) const KEY_STATUS: &str = "status";

/// Hook run once, on the very first construction against a given storage.
pub type FirstRunHook<'a> = Box<dyn FnOnce(&EntitlementGate) -> LicenseResult<()> + 'a>;

/// Decides on each launch whether the application may run.
///
/// Cloning is cheap; clones share state, so a background sync started by one
/// clone delivers to callbacks stored through another.
#[derive(Clone)]
pub struct EntitlementGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    app_id: String,
    config: GateConfig,
    prefs: Preferences,
    remote: Option<ServiceInit>,
    pending: PendingSlot,
    // Held for every status read-modify-write; never across an await.
    status_lock: Mutex<()>,
}

impl fmt::Debug for EntitlementGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitlementGate")
            .field("app_id", &self.inner.app_id)
            .field("namespace", &self.inner.prefs.namespace())
            .field("remote", &self.inner.remote.is_some())
            .finish()
    }
}

/// Point-in-time view of the persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSnapshot {
    /// Application identifier.
    pub application_id: String,
    /// Current status.
    pub status: EntitlementStatus,
    /// Remaining trial launches.
    pub trial_remaining: u32,
    /// First-run timestamp.
    pub first_seen: Option<String>,
}

/// Handle returned by [`EntitlementGate::check_validity`].
#[derive(Debug)]
pub struct Check {
    token: RequestToken,
    usable: bool,
    sync: Option<JoinHandle<()>>,
}

impl Check {
    /// Token identifying this request in delivered decisions.
    #[must_use]
    pub fn token(&self) -> RequestToken {
        self.token
    }

    /// The local decision, as already delivered to the callback.
    #[must_use]
    pub fn usable(&self) -> bool {
        self.usable
    }

    /// Whether a background sync was started.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.sync.is_some()
    }

    /// Waits for the background sync, if one was started.
    pub async fn finished(self) {
        if let Some(handle) = self.sync {
            if let Err(e) = handle.await {
                warn!("Background sync task failed: {}", e);
            }
        }
    }
}

/// Builder for [`EntitlementGate`].
pub struct GateBuilder<'a> {
    app_id: String,
    config: GateConfig,
    backend: Option<Arc<dyn PreferenceBackend>>,
    remote: Option<ServiceInit>,
    on_first_run: Option<FirstRunHook<'a>>,
}

impl<'a> GateBuilder<'a> {
    /// Sets the gate configuration.
    pub fn config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the preference backend. Defaults to in-memory preferences.
    pub fn preferences(mut self, backend: Arc<dyn PreferenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Binds the remote service, created lazily under the configured name.
    pub fn remote<F>(mut self, init: F) -> Self
    where
        F: Fn(&str) -> LicenseResult<RemoteService> + Send + Sync + 'static,
    {
        self.remote = Some(Arc::new(init));
        self
    }

    /// Binds a remote service built from an identity provider and a store.
    pub fn with_service(
        self,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn EntitlementStore>,
    ) -> Self {
        self.remote(move |name| Ok(RemoteService::new(name, identity.clone(), store.clone())))
    }

    /// Sets the first-run hook.
    pub fn on_first_run<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&EntitlementGate) -> LicenseResult<()> + 'a,
    {
        self.on_first_run = Some(Box::new(hook));
        self
    }

    /// Builds the gate, initializing persisted state on first run.
    ///
    /// # Errors
    ///
    /// Fails on an empty application id, a storage failure, or an error
    /// returned by the first-run hook. The first-run marker is written before
    /// the hook runs, so a failing hook is not retried.
    pub fn build(self) -> LicenseResult<EntitlementGate> {
        let app_id = self.app_id.trim().to_string();
        if app_id.is_empty() {
            return Err(LicenseError::InvalidApplicationId(self.app_id));
        }

        let backend: Arc<dyn PreferenceBackend> = match self.backend {
            Some(backend) => backend,
            None => {
                debug!("No preference backend given, using in-memory preferences");
                Arc::new(MemoryPreferences::new())
            }
        };
        let prefs = Preferences::new(backend, self.config.namespace.clone());

        let gate = EntitlementGate {
            inner: Arc::new(GateInner {
                app_id,
                config: self.config,
                prefs,
                remote: self.remote,
                pending: PendingSlot::default(),
                status_lock: Mutex::new(()),
            }),
        };

        gate.initialize(self.on_first_run)?;
        Ok(gate)
    }
}

impl EntitlementGate {
    /// Starts building a gate for `app_id`.
    pub fn builder<'a>(app_id: impl Into<String>) -> GateBuilder<'a> {
        GateBuilder {
            app_id: app_id.into(),
            config: GateConfig::default(),
            backend: None,
            remote: None,
            on_first_run: None,
        }
    }

    /// Creates a gate over `backend` with default configuration and no remote.
    pub fn create(
        backend: Arc<dyn PreferenceBackend>,
        app_id: impl Into<String>,
        on_first_run: Option<FirstRunHook<'_>>,
    ) -> LicenseResult<Self> {
        let mut builder = Self::builder(app_id).preferences(backend);
        builder.on_first_run = on_first_run;
        builder.build()
    }

    fn initialize(&self, on_first_run: Option<FirstRunHook<'_>>) -> LicenseResult<bool> {
        let marker = self.inner.prefs.get_string(KEY_FIRST_SEEN)?;
        if marker.as_deref().is_some_and(|m| !m.trim().is_empty()) {
            return Ok(false);
        }

        let now = chrono::Utc::now().to_rfc3339();
        self.inner.prefs.put_string(KEY_FIRST_SEEN, &now)?;
        self.set_status(EntitlementStatus::NotYetChecked)?;
        info!("First run of {} recorded at {}", self.inner.app_id, now);

        if let Some(hook) = on_first_run {
            hook(self)?;
        }
        Ok(true)
    }

    /// The application identifier.
    #[must_use]
    pub fn application_id(&self) -> &str {
        &self.inner.app_id
    }

    /// The gate configuration.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.inner.config
    }

    /// Whether a remote service is bound.
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.inner.remote.is_some()
    }

    /// The persisted status. Unset reads as `NotYetChecked`.
    pub fn status(&self) -> LicenseResult<EntitlementStatus> {
        match self.inner.prefs.get_string(KEY_STATUS)? {
            None => Ok(EntitlementStatus::NotYetChecked),
            Some(raw) => raw.parse().map_err(|_| {
                LicenseError::Storage(StorageError::InvalidData(format!(
                    "unknown local status {raw:?}"
                )))
            }),
        }
    }

    pub(crate) fn set_status(&self, status: EntitlementStatus) -> LicenseResult<()> {
        let _guard = self.lock_status()?;
        self.write_status(status)
    }

    fn write_status(&self, status: EntitlementStatus) -> LicenseResult<()> {
        self.inner.prefs.put_string(KEY_STATUS, status.as_str())?;
        Ok(())
    }

    fn lock_status(&self) -> LicenseResult<MutexGuard<'_, ()>> {
        self.inner
            .status_lock
            .lock()
            .map_err(|_| LicenseError::Storage(StorageError::Poisoned))
    }

    /// The first-run timestamp, `None` before initialization.
    pub fn first_seen(&self) -> LicenseResult<Option<String>> {
        Ok(self
            .inner
            .prefs
            .get_string(KEY_FIRST_SEEN)?
            .filter(|m| !m.trim().is_empty()))
    }

    /// Remaining trial launches.
    pub fn trial_allowance(&self) -> LicenseResult<u32> {
        Ok(self
            .inner
            .prefs
            .get_u32_or(KEY_TRIAL_REMAINING, self.inner.config.default_trial_allowance)?)
    }

    /// Sets the remaining trial launches. Meant to be called before first use.
    pub fn set_trial_allowance(&self, allowance: u32) -> LicenseResult<()> {
        debug!("Trial allowance for {} set to {}", self.inner.app_id, allowance);
        self.inner.prefs.put_u32(KEY_TRIAL_REMAINING, allowance)?;
        Ok(())
    }

    /// Reads all persisted state at once.
    pub fn snapshot(&self) -> LicenseResult<GateSnapshot> {
        Ok(GateSnapshot {
            application_id: self.inner.app_id.clone(),
            status: self.status()?,
            trial_remaining: self.trial_allowance()?,
            first_seen: self.first_seen()?,
        })
    }

    /// Runs the fast path: decides from local state, spending trial if needed.
    fn evaluate(&self) -> LicenseResult<bool> {
        let _guard = self.lock_status()?;
        let status = self.status()?;
        let remaining = self.trial_allowance()?;
        let step = trial::apply(status, remaining, self.inner.config.pending_policy);

        // Counter before status: an interrupted call undercounts the trial.
        if let Some(after) = step.remaining {
            self.inner.prefs.put_u32(KEY_TRIAL_REMAINING, after)?;
        }
        if let Some(next) = step.status {
            // Only a still-pending status is demoted; anything written since wins.
            let current = self.status()?;
            if current == status {
                self.write_status(next)?;
                info!(
                    "Trial of {} exhausted while {}, status now {}",
                    self.inner.app_id, status, next
                );
            } else {
                debug!(
                    "Status of {} moved to {} meanwhile, keeping it",
                    self.inner.app_id, current
                );
            }
        }

        debug!(
            "Fast path for {}: status={} remaining={} usable={}",
            self.inner.app_id,
            status,
            step.remaining.unwrap_or(remaining),
            step.usable
        );
        Ok(step.usable)
    }

    /// Decides whether the application may run.
    ///
    /// The local decision is delivered to `callback` before this returns.
    /// When a remote service is bound and a tokio runtime is current, a
    /// background sync is started; if it reads the user's record, `callback`
    /// receives one more decision with [`Origin::Remote`], unless a later
    /// `check_validity` replaced it first.
    ///
    /// # Errors
    ///
    /// Only local storage failures are returned, and then `callback` is not
    /// invoked. Sync failures are logged and never surface here.
    pub fn check_validity<F>(&self, callback: F) -> LicenseResult<Check>
    where
        F: Fn(Decision) + Send + Sync + 'static,
    {
        let token = RequestToken::new();
        let callback: DecisionCallback = Arc::new(callback);

        let usable = self.evaluate()?;
        callback(Decision {
            token,
            origin: Origin::Local,
            usable,
        });

        self.inner.pending.store(token, callback);

        let sync = if self.inner.config.sync_on_check {
            self.spawn_sync()
        } else {
            None
        };

        Ok(Check {
            token,
            usable,
            sync,
        })
    }

    /// Token of the request still waiting for a remote decision.
    #[must_use]
    pub fn awaiting_remote(&self) -> Option<RequestToken> {
        self.inner.pending.armed()
    }

    fn spawn_sync(&self) -> Option<JoinHandle<()>> {
        if self.inner.remote.is_none() {
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime, skipping background sync for {}", self.inner.app_id);
            return None;
        };

        let gate = self.clone();
        Some(runtime.spawn(async move {
            match gate.synchronize().await {
                Ok(outcome) => debug!("Background sync finished: {:?}", outcome),
                Err(e) => debug!("Background sync gave up: {}", e),
            }
        }))
    }

    pub(crate) fn service_init(&self) -> Option<&ServiceInit> {
        self.inner.remote.as_ref()
    }

    /// Delivers a remote decision to the waiting callback, if any.
    pub(crate) fn deliver_remote(&self, usable: bool) {
        match self.inner.pending.take() {
            Some((token, callback)) => callback(Decision {
                token,
                origin: Origin::Remote,
                usable,
            }),
            None => debug!("No callback waiting for remote decision"),
        }
    }
}
