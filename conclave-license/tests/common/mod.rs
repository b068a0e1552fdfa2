//! Shared test helpers for entitlement gate tests.

#![allow(dead_code)]

use async_trait::async_trait;
use conclave_license::{
    Account, Decision, EntitlementGate, EntitlementRecord, EntitlementStatus, EntitlementStore,
    GateConfig, IdentityProvider, LicenseError, LicenseResult, SignIn, UserId,
};
use conclave_storage::{MemoryPreferences, PreferenceBackend};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const APP_ID: &str = "ConclaveTest";
pub const EMAIL: &str = "ada@example.com";

/// Identity provider that replays a fixed answer.
pub struct ScriptedIdentity {
    answer: Mutex<LicenseResult<SignIn>>,
    pub calls: AtomicUsize,
}

impl ScriptedIdentity {
    pub fn signed_in(email: &str) -> Arc<Self> {
        Self::answering(Ok(SignIn::SignedIn(Account::with_email("uid-1", email))))
    }

    pub fn without_email() -> Arc<Self> {
        Self::answering(Ok(SignIn::SignedIn(Account {
            uid: "uid-2".into(),
            email: None,
            display_name: None,
        })))
    }

    pub fn cancelled() -> Arc<Self> {
        Self::answering(Ok(SignIn::Cancelled))
    }

    pub fn failing() -> Arc<Self> {
        Self::answering(Err(LicenseError::RemoteUnavailable("provider down".into())))
    }

    fn answering(answer: LicenseResult<SignIn>) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(answer),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentity {
    fn provider_name(&self) -> &'static str {
        "Scripted"
    }

    async fn sign_in(&self) -> LicenseResult<SignIn> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.answer.lock().unwrap() {
            Ok(answer) => Ok(answer.clone()),
            Err(_) => Err(LicenseError::RemoteUnavailable("provider down".into())),
        }
    }
}

/// Entitlement store backed by a map, with a switch to simulate outages.
#[derive(Default)]
pub struct MapStore {
    pub records: Mutex<HashMap<(String, String), EntitlementRecord>>,
    pub offline: Mutex<bool>,
    pub puts: AtomicUsize,
}

impl MapStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_status(status: &str) -> Arc<Self> {
        let store = Self::new();
        store.insert_raw(serde_json::json!(status));
        store
    }

    pub fn insert_raw(&self, status: serde_json::Value) {
        self.records.lock().unwrap().insert(
            (APP_ID.to_string(), EMAIL.to_string()),
            EntitlementRecord {
                status: Some(status),
                requested_at: None,
                decided_at: None,
            },
        );
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn record(&self) -> Option<EntitlementRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(APP_ID.to_string(), EMAIL.to_string()))
            .cloned()
    }

    fn check_online(&self) -> LicenseResult<()> {
        if *self.offline.lock().unwrap() {
            Err(LicenseError::RemoteUnavailable("store offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EntitlementStore for MapStore {
    fn store_name(&self) -> &'static str {
        "Map"
    }

    async fn get(&self, app_id: &str, user: &UserId) -> LicenseResult<Option<EntitlementRecord>> {
        self.check_online()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(app_id.to_string(), user.to_string()))
            .cloned())
    }

    async fn put(
        &self,
        app_id: &str,
        user: &UserId,
        record: &EntitlementRecord,
    ) -> LicenseResult<()> {
        self.check_online()?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .insert((app_id.to_string(), user.to_string()), record.clone());
        Ok(())
    }
}

/// Config with a service name no other test shares, so the process-wide
/// service cache never hands one test another test's collaborators.
pub fn isolated_config() -> GateConfig {
    GateConfig {
        service_name: format!("test-{}", uuid::Uuid::new_v4()),
        ..Default::default()
    }
}

pub fn memory_backend() -> Arc<dyn PreferenceBackend> {
    Arc::new(MemoryPreferences::new())
}

/// A gate with no remote, the given allowance and status.
pub fn offline_gate(allowance: u32, status: EntitlementStatus) -> EntitlementGate {
    let backend = memory_backend();
    seed(&backend, allowance, status)
}

/// Builds a gate over `backend`, then forces allowance and status.
pub fn seed(
    backend: &Arc<dyn PreferenceBackend>,
    allowance: u32,
    status: EntitlementStatus,
) -> EntitlementGate {
    let gate = EntitlementGate::builder(APP_ID)
        .preferences(backend.clone())
        .build()
        .unwrap();
    gate.set_trial_allowance(allowance).unwrap();
    backend.put("conclave", "status", status.as_str()).unwrap();
    gate
}

/// A gate bound to the given collaborators.
pub fn remote_gate(
    backend: &Arc<dyn PreferenceBackend>,
    identity: Arc<ScriptedIdentity>,
    store: Arc<MapStore>,
) -> EntitlementGate {
    EntitlementGate::builder(APP_ID)
        .config(isolated_config())
        .preferences(backend.clone())
        .with_service(identity, store)
        .build()
        .unwrap()
}

/// Collects every decision delivered to a callback.
#[derive(Clone, Default)]
pub struct Recorder {
    pub decisions: Arc<Mutex<Vec<Decision>>>,
}

impl Recorder {
    pub fn callback(&self) -> impl Fn(Decision) + Send + Sync + 'static {
        let decisions = self.decisions.clone();
        move |d| decisions.lock().unwrap().push(d)
    }

    pub fn all(&self) -> Vec<Decision> {
        self.decisions.lock().unwrap().clone()
    }
}
