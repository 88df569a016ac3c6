#![forbid(unsafe_code)]

mod common;

use common::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use owop_core::{Rule, FINALIZER};
use owop_reconcile::{BackendError, FailureKind, Outcome};

fn deleting(mut r: Rule) -> Rule {
    r.metadata.finalizers = Some(vec!["other.example.com".to_string(), FINALIZER.to_string()]);
    r.metadata.deletion_timestamp = Some(Time(k8s_openapi::chrono::Utc::now()));
    r
}

#[tokio::test]
async fn delete_success_releases_finalizer() {
    let mut r = rule("r1", "/_/events", "/_/act", 2, 2);
    r.spec.name = Some("backend-r1".into());
    let h = Harness::new(MemStore::with_rule(deleting(r)));

    let out = h.engine.reconcile(&key("r1")).await.expect("ok");
    assert_eq!(out, Outcome::Finalized);
    assert_eq!(h.backend().deletes(), vec!["backend-r1".to_string()]);

    let stored = h.store.rule("r1").unwrap();
    assert!(!stored.has_finalizer(FINALIZER));
    // foreign finalizers are left alone
    assert!(stored.has_finalizer("other.example.com"));
}

#[tokio::test]
async fn delete_falls_back_to_resource_name() {
    let h = Harness::new(MemStore::with_rule(deleting(rule("r1", "/_/events", "/_/act", 1, 1))));
    h.engine.reconcile(&key("r1")).await.expect("ok");
    assert_eq!(h.backend().deletes(), vec!["r1".to_string()]);
}

#[tokio::test]
async fn retryable_delete_error_keeps_finalizer() {
    let h = Harness::new(MemStore::with_rule(deleting(rule("r1", "/_/events", "/_/act", 1, 1))));
    *h.backend().delete_error.lock().unwrap() = Some(BackendError::Status { status: 503, message: "unavailable".into() });
    let before = h.store.rule("r1").unwrap();

    let err = h.engine.reconcile(&key("r1")).await.expect_err("retry");
    assert_eq!(err.kind(), FailureKind::BackendTransient);

    assert_eq!(h.store.rule("r1").unwrap(), before);
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn non_retryable_delete_error_releases_finalizer() {
    let h = Harness::new(MemStore::with_rule(deleting(rule("r1", "/_/events", "/_/act", 1, 1))));
    *h.backend().delete_error.lock().unwrap() = Some(BackendError::Status { status: 404, message: "not found".into() });

    assert_eq!(h.engine.reconcile(&key("r1")).await.expect("ok"), Outcome::Finalized);
    assert!(!h.store.rule("r1").unwrap().has_finalizer(FINALIZER));
}

#[tokio::test]
async fn missing_credentials_release_finalizer_without_delete() {
    let h = Harness::new(MemStore::with_rule(deleting(rule("r1", "/_/events", "/_/act", 1, 1))));
    *h.provider.unavailable.lock().unwrap() = true;

    assert_eq!(h.engine.reconcile(&key("r1")).await.expect("ok"), Outcome::Finalized);
    assert!(h.backend().deletes().is_empty());
    assert!(!h.store.rule("r1").unwrap().has_finalizer(FINALIZER));
}

#[tokio::test]
async fn finalizer_write_failure_is_retried() {
    let h = Harness::new(MemStore::with_rule(deleting(rule("r1", "/_/events", "/_/act", 1, 1))));
    *h.store.fail_rule_updates.lock().unwrap() = true;

    let err = h.engine.reconcile(&key("r1")).await.expect_err("retry");
    assert_eq!(err.kind(), FailureKind::PersistenceConflict);
    assert!(h.store.rule("r1").unwrap().has_finalizer(FINALIZER));
}

#[tokio::test]
async fn deleting_rule_without_finalizer_needs_no_cleanup() {
    let mut r = deleting(rule("r1", "/_/events", "/_/act", 1, 1));
    r.metadata.finalizers = Some(vec!["other.example.com".to_string()]);
    let h = Harness::new(MemStore::with_rule(r));

    assert_eq!(h.engine.reconcile(&key("r1")).await.expect("ok"), Outcome::Finalized);
    assert!(h.backend().deletes().is_empty());
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn deletion_skips_generation_gate() {
    // converged rules still get cleaned up
    let h = Harness::new(MemStore::with_rule(deleting(rule("r1", "/_/events", "/_/act", 5, 5))));
    assert_eq!(h.engine.reconcile(&key("r1")).await.expect("ok"), Outcome::Finalized);
    assert!(h.backend().inserts().is_empty());
    assert_eq!(h.backend().deletes().len(), 1);
}
