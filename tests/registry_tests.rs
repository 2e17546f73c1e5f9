mod common;

use std::sync::Arc;

use cachegrid_backend::events::EventBus;
use cachegrid_backend::registry::{
    LookupSource, PodIdentity, SqliteWorkerStore, WorkerDefinition, WorkerRegistry, WorkerStore,
};

use common::engine;

fn pod(id: &str, region: &str) -> PodIdentity {
    PodIdentity {
        pod_id: id.to_string(),
        region: region.to_string(),
        endpoint: format!("http://{id}:8080"),
    }
}

fn definition(id: &str) -> WorkerDefinition {
    WorkerDefinition {
        id: id.to_string(),
        code_cid: format!("bafy-{id}"),
        name: format!("worker {id}"),
        metadata: serde_json::json!({"runtime": "js"}),
        active: true,
    }
}

#[tokio::test]
async fn test_three_tier_lookup_end_to_end() {
    // A sqlite file store shared by two pods that also share the cache.
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite:{}?mode=rwc",
        dir.path().join("workers.db").display()
    );
    let store = Arc::new(SqliteWorkerStore::connect(&url).await.unwrap());
    store.upsert(&definition("w1")).await.unwrap();

    let cache = Arc::new(engine());
    let events = Arc::new(EventBus::new());

    let pod_a = WorkerRegistry::new(
        pod("pod-a", "us-east"),
        Arc::clone(&cache),
        Some(store.clone() as Arc<dyn WorkerStore>),
        Arc::clone(&events),
    );

    // First sight of w1 comes from the persistent store.
    let hit = pod_a.get_worker("w1").await.unwrap().unwrap();
    assert_eq!(hit.source, LookupSource::Persistent);
    assert!(hit.cold_start);

    // The store hit populated the cache, so a fresh pod resolves from it.
    let pod_b = WorkerRegistry::new(
        pod("pod-b", "eu-west"),
        Arc::clone(&cache),
        Some(store as Arc<dyn WorkerStore>),
        Arc::clone(&events),
    );
    let hit = pod_b.get_worker("w1").await.unwrap().unwrap();
    assert_eq!(hit.source, LookupSource::Cache);
    assert!(hit.cold_start);

    // And once registered, it is a warm memory hit.
    let hit = pod_b.get_worker("w1").await.unwrap().unwrap();
    assert_eq!(hit.source, LookupSource::Memory);
    assert!(!hit.cold_start);
}

#[tokio::test]
async fn test_warm_pods_cover_every_registered_pod() {
    let cache = Arc::new(engine());
    let events = Arc::new(EventBus::new());

    for id in ["pod-a", "pod-b"] {
        let registry = WorkerRegistry::new(
            pod(id, "us-east"),
            Arc::clone(&cache),
            None,
            Arc::clone(&events),
        );
        registry.register_local(&definition("w1")).unwrap();
    }

    let reader = WorkerRegistry::new(
        pod("pod-c", "us-east"),
        Arc::clone(&cache),
        None,
        events,
    );
    let pods = reader.find_warm_pods("w1", None).await.unwrap();
    let ids: Vec<&str> = pods.iter().map(|p| p.pod_id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"pod-a") && ids.contains(&"pod-b"));
}

#[tokio::test]
async fn test_heartbeat_and_close_lifecycle() {
    let cache = Arc::new(engine());
    let registry = WorkerRegistry::new(
        pod("pod-a", "us-east"),
        Arc::clone(&cache),
        None,
        Arc::new(EventBus::new()),
    );

    registry.heartbeat().unwrap();
    assert_eq!(registry.node_count(), 1);
    let pods = registry.live_pods().unwrap();
    assert_eq!(pods[0].pod_id, "pod-a");

    registry.close();
    assert_eq!(registry.node_count(), 0);
}

#[tokio::test]
async fn test_unregister_removes_own_stanza_only() {
    let cache = Arc::new(engine());
    let events = Arc::new(EventBus::new());

    let pod_a = WorkerRegistry::new(
        pod("pod-a", "us-east"),
        Arc::clone(&cache),
        None,
        Arc::clone(&events),
    );
    let pod_b = WorkerRegistry::new(
        pod("pod-b", "us-east"),
        Arc::clone(&cache),
        None,
        events,
    );
    pod_a.register_local(&definition("w1")).unwrap();
    pod_b.register_local(&definition("w1")).unwrap();

    pod_a.unregister_local("w1").unwrap();

    let pods = pod_b.find_warm_pods("w1", None).await.unwrap();
    let ids: Vec<&str> = pods.iter().map(|p| p.pod_id.as_str()).collect();
    assert_eq!(ids, vec!["pod-b"]);
}
