//! Create-or-update behavior of the applier.

use keydb_operator::controller::apply::apply_resource;
use keydb_operator::controller::events::ApplyAction;
use keydb_operator::controller::store::{ChildKind, ChildResource};
use keydb_operator::resources::service_account::generate_service_account;
use keydb_operator::resources::services::generate_client_service;

use crate::fixtures::default_cluster;
use crate::mock_store::{MockStore, Op, RecordingSink};

#[tokio::test]
async fn test_apply_twice_creates_then_updates() {
    let store = MockStore::new();
    let sink = RecordingSink::new();
    let keydb = default_cluster("prod");
    let desired = ChildResource::from(generate_client_service(&keydb).unwrap());

    let first = apply_resource(&store, &sink, desired.clone()).await.unwrap();
    let second = apply_resource(&store, &sink, desired).await.unwrap();

    assert_eq!(first, ApplyAction::Created);
    assert_eq!(second, ApplyAction::Updated);
    assert_eq!(
        sink.notifications(),
        vec![
            (
                ApplyAction::Created,
                ChildKind::Service,
                "cache-svc".to_string(),
                "prod".to_string()
            ),
            (
                ApplyAction::Updated,
                ChildKind::Service,
                "cache-svc".to_string(),
                "prod".to_string()
            ),
        ]
    );
    assert_eq!(store.object_count(), 1);
}

#[tokio::test]
async fn test_update_carries_resource_version() {
    let store = MockStore::new();
    let sink = RecordingSink::new();
    let keydb = default_cluster("prod");
    let desired = ChildResource::from(generate_service_account(&keydb).unwrap());

    apply_resource(&store, &sink, desired.clone()).await.unwrap();
    apply_resource(&store, &sink, desired.clone()).await.unwrap();
    apply_resource(&store, &sink, desired).await.unwrap();

    let stored = store
        .object(ChildKind::ServiceAccount, "prod", "cache")
        .unwrap();
    assert_eq!(stored.metadata().resource_version.as_deref(), Some("3"));
}

#[tokio::test]
async fn test_pre_existing_object_is_never_created() {
    let store = MockStore::new();
    let sink = RecordingSink::new();
    let keydb = default_cluster("prod");
    let service = generate_client_service(&keydb).unwrap();
    store.seed(service.clone());

    let desired = ChildResource::from(service);
    apply_resource(&store, &sink, desired.clone()).await.unwrap();
    apply_resource(&store, &sink, desired).await.unwrap();

    assert_eq!(
        sink.actions(),
        vec![ApplyAction::Updated, ApplyAction::Updated]
    );
    assert!(store.writes().iter().all(|(op, _, _)| *op == Op::Update));
}

#[tokio::test]
async fn test_lookup_error_propagates_without_write() {
    let store = MockStore::new();
    let sink = RecordingSink::new();
    let keydb = default_cluster("prod");
    store.fail(ChildKind::Service, Op::Get, 500);

    let desired = ChildResource::from(generate_client_service(&keydb).unwrap());
    let err = apply_resource(&store, &sink, desired).await.unwrap_err();

    assert!(err.is_retryable());
    assert!(store.writes().is_empty());
    assert!(sink.notifications().is_empty());
}

#[tokio::test]
async fn test_update_error_is_not_reported_as_applied() {
    let store = MockStore::new();
    let sink = RecordingSink::new();
    let keydb = default_cluster("prod");
    let service = generate_client_service(&keydb).unwrap();
    store.seed(service.clone());
    store.fail(ChildKind::Service, Op::Update, 422);

    let err = apply_resource(&store, &sink, ChildResource::from(service))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert!(sink.notifications().is_empty());
}
