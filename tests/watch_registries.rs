//! Integration tests for registry watches: replay, live fan-out, ordering,
//! tenant filtering and slow-consumer handling.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{ctx, registry, TestCatalog, PLATFORM_CA};
use registry_catalog::auth::AllowAllAuthorizer;
use registry_catalog::domain::{
    CreateRegistryRequest, DeleteRegistryRequest, RegistryType, UpdateRegistryRequest, WatchRegistriesRequest,
    DYNAMIC_CA_CERTS_NAME,
};
use registry_catalog::errors::CatalogError;
use registry_catalog::secrets::InlineBackendProvider;
use registry_catalog::{RegistryEvent, RegistryEventKind, RegistryWatch};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn watch_request(no_replay: bool, show_sensitive_info: bool) -> WatchRegistriesRequest {
    WatchRegistriesRequest { project_id: String::new(), no_replay, show_sensitive_info }
}

async fn next_event(watch: &mut RegistryWatch) -> RegistryEvent {
    tokio::time::timeout(EVENT_TIMEOUT, watch.next())
        .await
        .expect("event within timeout")
        .expect("watch still open")
        .expect("event is not an error")
}

async fn assert_quiet(watch: &mut RegistryWatch) {
    let next = tokio::time::timeout(Duration::from_millis(100), watch.next()).await;
    assert!(next.is_err(), "unexpected event: {:?}", next);
}

#[tokio::test]
async fn test_replay_then_live_without_duplicates() {
    let catalog = TestCatalog::new("watch_replay").await;
    catalog.create("p1", registry("alpha", RegistryType::Helm)).await;
    catalog.create("p1", registry("bravo", RegistryType::Image)).await;

    let mut watch = catalog.service.watch_registries(&ctx("p1"), watch_request(false, false)).await.unwrap();

    let mut replayed = vec![next_event(&mut watch).await, next_event(&mut watch).await];
    replayed.sort_by(|a, b| a.registry.name.cmp(&b.registry.name));
    assert!(replayed.iter().all(|e| e.kind == RegistryEventKind::Replayed));
    assert_eq!(replayed[0].registry.name, "alpha");
    assert_eq!(replayed[1].registry.name, "bravo");

    catalog.create("p1", registry("charlie", RegistryType::Helm)).await;
    let live = next_event(&mut watch).await;
    assert_eq!(live.kind, RegistryEventKind::Created);
    assert_eq!(live.registry.name, "charlie");

    catalog.service.delete_registry(&ctx("p1"), DeleteRegistryRequest { registry_name: "alpha".to_string() }).await.unwrap();
    let deleted = next_event(&mut watch).await;
    assert_eq!(deleted.kind, RegistryEventKind::Deleted);
    assert_eq!(deleted.registry.name, "alpha");
    assert_eq!(deleted.registry.registry_type, RegistryType::Helm);

    assert_quiet(&mut watch).await;
}

#[tokio::test]
async fn test_no_replay_starts_with_live_events() {
    let catalog = TestCatalog::new("watch_no_replay").await;
    catalog.create("p1", registry("alpha", RegistryType::Helm)).await;

    let mut watch = catalog.service.watch_registries(&ctx("p1"), watch_request(true, false)).await.unwrap();
    assert_eq!(watch.pending_replay(), 0);
    assert_quiet(&mut watch).await;

    catalog.create("p1", registry("bravo", RegistryType::Helm)).await;
    let event = next_event(&mut watch).await;
    assert_eq!(event.kind, RegistryEventKind::Created);
    assert_eq!(event.registry.name, "bravo");
}

#[tokio::test]
async fn test_per_registry_events_follow_commit_order() {
    let catalog = TestCatalog::new("watch_order").await;
    let mut watch = catalog.service.watch_registries(&ctx("p1"), watch_request(true, false)).await.unwrap();

    catalog.create("p1", registry("charts", RegistryType::Helm)).await;
    let mut changed = registry("charts", RegistryType::Helm);
    changed.description = "v2".to_string();
    catalog
        .service
        .update_registry(&ctx("p1"), UpdateRegistryRequest { registry_name: "charts".to_string(), registry: changed })
        .await
        .unwrap();
    catalog.service.delete_registry(&ctx("p1"), DeleteRegistryRequest { registry_name: "charts".to_string() }).await.unwrap();

    let kinds = [
        next_event(&mut watch).await.kind,
        next_event(&mut watch).await.kind,
        next_event(&mut watch).await.kind,
    ];
    assert_eq!(kinds, [RegistryEventKind::Created, RegistryEventKind::Updated, RegistryEventKind::Deleted]);
}

#[tokio::test]
async fn test_failed_mutation_publishes_nothing() {
    let catalog = TestCatalog::new("watch_failed").await;
    catalog.create("p1", registry("charts", RegistryType::Helm)).await;
    let mut watch = catalog.service.watch_registries(&ctx("p1"), watch_request(true, false)).await.unwrap();

    let err = catalog
        .service
        .create_registry(&ctx("p1"), CreateRegistryRequest { registry: registry("charts", RegistryType::Helm) })
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::AlreadyExists { .. }));

    assert_quiet(&mut watch).await;
}

#[tokio::test]
async fn test_watchers_only_see_their_project() {
    let catalog = TestCatalog::new("watch_tenants").await;
    let mut p1 = catalog.service.watch_registries(&ctx("p1"), watch_request(true, false)).await.unwrap();
    let mut p2 = catalog.service.watch_registries(&ctx("p2"), watch_request(true, false)).await.unwrap();

    catalog.create("p2", registry("other", RegistryType::Helm)).await;
    catalog.create("p1", registry("mine", RegistryType::Helm)).await;

    assert_eq!(next_event(&mut p1).await.registry.name, "mine");
    assert_eq!(next_event(&mut p2).await.registry.name, "other");
    assert_quiet(&mut p1).await;
    assert_quiet(&mut p2).await;
}

#[tokio::test]
async fn test_admin_project_can_watch_another_project() {
    let catalog = TestCatalog::new("watch_admin").await;
    catalog.create("p1", registry("charts", RegistryType::Helm)).await;

    let request = WatchRegistriesRequest { project_id: "p1".to_string(), no_replay: false, show_sensitive_info: false };
    let mut watch = catalog.service.watch_registries(&ctx("default"), request).await.unwrap();

    let event = next_event(&mut watch).await;
    assert_eq!(event.kind, RegistryEventKind::Replayed);
    assert_eq!(event.project_id, "p1");

    // A non-admin caller keeps its own project.
    let request = WatchRegistriesRequest { project_id: "p1".to_string(), no_replay: false, show_sensitive_info: false };
    let watch = catalog.service.watch_registries(&ctx("p2"), request).await.unwrap();
    assert_eq!(watch.pending_replay(), 0);
}

#[tokio::test]
async fn test_sensitive_fields_follow_the_watch_flag() {
    let catalog = TestCatalog::new("watch_sensitive").await;
    let mut dynamic = registry("images", RegistryType::Image);
    dynamic.ca_certs = DYNAMIC_CA_CERTS_NAME.to_string();
    catalog.create("p1", dynamic).await;

    let mut plain = catalog.service.watch_registries(&ctx("p1"), watch_request(false, false)).await.unwrap();
    let mut full = catalog.service.watch_registries(&ctx("p1"), watch_request(false, true)).await.unwrap();

    let replayed = next_event(&mut plain).await;
    assert!(replayed.registry.auth_token.is_empty());
    assert!(replayed.registry.ca_certs.is_empty());

    let replayed = next_event(&mut full).await;
    assert_eq!(replayed.registry.auth_token, "images-token");
    assert_eq!(replayed.registry.ca_certs, PLATFORM_CA);

    catalog.create("p1", registry("charts", RegistryType::Helm)).await;
    let live = next_event(&mut plain).await;
    assert!(live.registry.auth_token.is_empty());
    assert!(live.registry.username.is_empty());
    let live = next_event(&mut full).await;
    assert_eq!(live.registry.auth_token, "charts-token");
}

#[tokio::test]
async fn test_concurrent_writer_is_seen_exactly_once() {
    let catalog = Arc::new(TestCatalog::new("watch_concurrent").await);
    for i in 0..5 {
        catalog.create("p1", registry(&format!("pre-{}", i), RegistryType::Helm)).await;
    }

    let writer = {
        let catalog = catalog.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                catalog.create("p1", registry(&format!("live-{}", i), RegistryType::Helm)).await;
                tokio::task::yield_now().await;
            }
        })
    };

    tokio::task::yield_now().await;
    let mut watch = catalog.service.watch_registries(&ctx("p1"), watch_request(false, false)).await.unwrap();

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut live_started = false;
    while seen.len() < 25 {
        let event = next_event(&mut watch).await;
        match event.kind {
            RegistryEventKind::Replayed => assert!(!live_started, "replay after live event"),
            RegistryEventKind::Created => live_started = true,
            other => panic!("unexpected event kind {}", other),
        }
        *seen.entry(event.registry.name).or_default() += 1;
    }

    writer.await.unwrap();
    assert!(seen.values().all(|count| *count == 1), "duplicates: {:?}", seen);
    assert_quiet(&mut watch).await;
}

#[tokio::test]
async fn test_slow_watcher_is_disconnected() {
    let catalog =
        TestCatalog::with_parts("watch_slow", Arc::new(InlineBackendProvider), Arc::new(AllowAllAuthorizer), 1).await;
    let mut watch = catalog.service.watch_registries(&ctx("p1"), watch_request(true, false)).await.unwrap();

    catalog.create("p1", registry("alpha", RegistryType::Helm)).await;
    catalog.create("p1", registry("bravo", RegistryType::Helm)).await;
    assert_eq!(catalog.service.events().subscriber_count(), 0);

    assert_eq!(next_event(&mut watch).await.registry.name, "alpha");
    let err = watch.next().await.unwrap().unwrap_err();
    assert!(matches!(err, CatalogError::Unavailable { .. }));

    // Writers are unaffected.
    catalog.create("p1", registry("charlie", RegistryType::Helm)).await;
}

#[tokio::test]
async fn test_forward_until_cancelled_releases_subscription() {
    let catalog = TestCatalog::new("watch_forward").await;
    catalog.create("p1", registry("alpha", RegistryType::Helm)).await;
    let watch = catalog.service.watch_registries(&ctx("p1"), watch_request(false, false)).await.unwrap();
    assert_eq!(catalog.service.events().subscriber_count(), 1);

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(16);
    let task = tokio::spawn(watch.forward(cancel.clone(), move |event| {
        let tx = tx.clone();
        async move { tx.send(event).await }
    }));

    assert_eq!(rx.recv().await.unwrap().kind, RegistryEventKind::Replayed);
    catalog.create("p1", registry("bravo", RegistryType::Helm)).await;
    assert_eq!(rx.recv().await.unwrap().registry.name, "bravo");

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert_eq!(catalog.service.events().subscriber_count(), 0);
}

#[tokio::test]
async fn test_dropping_watch_unregisters() {
    let catalog = TestCatalog::new("watch_drop").await;
    let watch = catalog.service.watch_registries(&ctx("p1"), watch_request(true, false)).await.unwrap();
    assert_eq!(catalog.service.events().subscriber_count(), 1);

    drop(watch);
    assert_eq!(catalog.service.events().subscriber_count(), 0);
    catalog.create("p1", registry("alpha", RegistryType::Helm)).await;
}
