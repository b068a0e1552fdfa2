use conclave_license::{
    Decision, EntitlementGate, EntitlementStatus, EntitlementStore, GateConfig, IdentityProvider,
    Origin, SignIn, SyncOutcome, UserId,
};
use conclave_remote::{FixedIdentity, MemoryEntitlementStore};
use conclave_storage::MemoryPreferences;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

const APP_ID: &str = "com.example.notes";

fn isolated_config() -> GateConfig {
    GateConfig {
        service_name: format!("test-{}", uuid::Uuid::new_v4()),
        ..Default::default()
    }
}

fn gate(store: Arc<MemoryEntitlementStore>, identity: FixedIdentity) -> EntitlementGate {
    EntitlementGate::builder(APP_ID)
        .config(isolated_config())
        .preferences(Arc::new(MemoryPreferences::new()))
        .with_service(Arc::new(identity), store)
        .build()
        .unwrap()
}

#[tokio::test]
async fn fixed_identity_answers() {
    let SignIn::SignedIn(account) = FixedIdentity::email("ada@example.com").sign_in().await.unwrap()
    else {
        panic!("expected a signed-in account");
    };
    assert_eq!(account.email.as_deref(), Some("ada@example.com"));
    assert_eq!(
        FixedIdentity::cancelling().sign_in().await.unwrap(),
        SignIn::Cancelled
    );
}

#[tokio::test]
async fn memory_store_get_put_decide() {
    let store = MemoryEntitlementStore::new();
    let user = UserId::parse("ada@example.com").unwrap();
    assert!(store.is_empty().await);
    assert!(store.get(APP_ID, &user).await.unwrap().is_none());

    store
        .put(APP_ID, &user, &conclave_license::EntitlementRecord::pending())
        .await
        .unwrap();
    store.decide(APP_ID, &user, EntitlementStatus::Accepted).await;

    let record = store.get(APP_ID, &user).await.unwrap().unwrap();
    assert_eq!(record.decode_status().unwrap(), EntitlementStatus::Accepted);
    assert!(record.requested_at.is_some());
    assert!(record.decided_at.is_some());
    assert_eq!(store.list(APP_ID).await.len(), 1);
    assert!(store.list("other").await.is_empty());
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn enroll_then_approve_end_to_end() {
    let store = Arc::new(MemoryEntitlementStore::new());
    let gate = gate(store.clone(), FixedIdentity::email("Ada@Example.com"));
    gate.set_trial_allowance(5).unwrap();

    assert_eq!(gate.synchronize().await.unwrap(), SyncOutcome::Enrolled);
    assert_eq!(gate.status().unwrap(), EntitlementStatus::Pending);

    let user = UserId::parse("ada@example.com").unwrap();
    store.decide(APP_ID, &user, EntitlementStatus::Accepted).await;

    let seen: Arc<Mutex<Vec<Decision>>> = Arc::default();
    let sink = seen.clone();
    let check = gate
        .check_validity(move |d| sink.lock().unwrap().push(d))
        .unwrap();
    check.finished().await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].origin, Origin::Local);
    assert_eq!(seen[1].origin, Origin::Remote);
    assert!(seen[1].usable);
    assert_eq!(gate.status().unwrap(), EntitlementStatus::Accepted);
}

#[tokio::test]
async fn cancelled_identity_leaves_state() {
    let store = Arc::new(MemoryEntitlementStore::new());
    let gate = gate(store.clone(), FixedIdentity::cancelling());
    assert_eq!(gate.synchronize().await.unwrap(), SyncOutcome::Cancelled);
    assert_eq!(gate.status().unwrap(), EntitlementStatus::NotYetChecked);
    assert!(store.is_empty().await);
}
