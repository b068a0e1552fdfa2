mod common;

use common::{MapStore, ScriptedIdentity, EMAIL};
use conclave_license::registry;
use conclave_license::{LicenseError, RemoteService};
use serial_test::serial;
use std::sync::Arc;

const NAME: &str = "Conclave";

fn service(name: &str) -> RemoteService {
    RemoteService::new(name, ScriptedIdentity::signed_in(EMAIL), MapStore::new())
}

#[test]
#[serial]
fn get_or_init_reuses_handle() {
    registry::forget(NAME);

    let first = registry::get_or_init(NAME, || Ok(service(NAME))).unwrap();
    let second = registry::get_or_init(NAME, || panic!("must not re-initialize")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.name(), NAME);
    registry::forget(NAME);
}

#[test]
#[serial]
fn failed_init_caches_nothing() {
    registry::forget(NAME);

    let err = registry::get_or_init(NAME, || Err(LicenseError::RemoteUnavailable("boom".into())))
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(registry::get(NAME).is_none());

    let ok = registry::get_or_init(NAME, || Ok(service(NAME)));
    assert!(ok.is_ok());
    registry::forget(NAME);
}

#[test]
#[serial]
fn forget_drops_handle() {
    registry::forget(NAME);
    registry::get_or_init(NAME, || Ok(service(NAME))).unwrap();

    assert!(registry::forget(NAME));
    assert!(!registry::forget(NAME));
    assert!(registry::get(NAME).is_none());
}

#[test]
fn names_are_independent() {
    let a = format!("a-{}", uuid::Uuid::new_v4());
    let b = format!("b-{}", uuid::Uuid::new_v4());
    let sa = registry::get_or_init(&a, || Ok(service(&a))).unwrap();
    let sb = registry::get_or_init(&b, || Ok(service(&b))).unwrap();
    assert!(!Arc::ptr_eq(&sa, &sb));
    assert_eq!(sa.name(), a);
    assert_eq!(sb.name(), b);
}

#[test]
fn service_debug_names_collaborators() {
    let svc = service("dbg");
    let debug = format!("{svc:?}");
    assert!(debug.contains("Scripted"));
    assert!(debug.contains("Map"));
}
