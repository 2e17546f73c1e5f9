mod common;

use std::sync::Arc;
use std::time::Duration;

use cachegrid_backend::engine::{SetOptions, ZsetMember};
use cachegrid_backend::metrics::CacheMetrics;

use common::{engine, engine_with};

fn set_opts() -> SetOptions {
    SetOptions::default()
}

#[test]
fn test_lru_eviction_order() {
    // ~300 KB entries against a 1 MB budget: three fit, the fourth evicts.
    let metrics = Arc::new(CacheMetrics::new());
    let engine = engine_with(1024 * 1024, Arc::clone(&metrics));
    let payload = "x".repeat(300_000);

    for key in ["a", "b", "c"] {
        engine.set("default", key, payload.clone(), set_opts()).unwrap();
    }

    // Reading `a` moves it to the most-recently-used end.
    assert!(engine.get("default", "a").unwrap().is_some());

    engine.set("default", "d", payload.clone(), set_opts()).unwrap();

    assert_eq!(metrics.evictions(), 1);
    assert!(engine.get("default", "b").unwrap().is_none(), "b was the LRU head");
    for key in ["a", "c", "d"] {
        assert!(
            engine.get("default", key).unwrap().is_some(),
            "{key} should survive"
        );
    }

    let audit = engine.audit();
    assert_eq!(audit.used_bytes, audit.recomputed_bytes);
    assert!(audit.used_bytes <= 1024 * 1024);
}

#[test]
fn test_oversized_value_fails_and_rolls_back() {
    let metrics = Arc::new(CacheMetrics::new());
    let engine = engine_with(1024 * 1024, Arc::clone(&metrics));

    engine.set("default", "keep", "v".into(), set_opts()).unwrap();

    let huge = "x".repeat(2 * 1024 * 1024);
    let err = engine.set("default", "big", huge, set_opts()).unwrap_err();
    assert_eq!(err.code(), "MEMORY_LIMIT");

    // The failed write left no trace and existing data is intact.
    assert!(engine.get("default", "big").unwrap().is_none());
    assert_eq!(engine.get("default", "keep").unwrap(), Some("v".to_string()));
    let audit = engine.audit();
    assert_eq!(audit.used_bytes, audit.recomputed_bytes);
    assert_eq!(audit.entries, audit.lru_nodes);
}

#[test]
fn test_overwrite_rollback_restores_previous_value() {
    let engine = engine_with(1024, Arc::new(CacheMetrics::new()));
    engine.set("default", "k", "small".into(), set_opts()).unwrap();

    let err = engine
        .set("default", "k", "y".repeat(4096), set_opts())
        .unwrap_err();
    assert_eq!(err.code(), "MEMORY_LIMIT");
    assert_eq!(engine.get("default", "k").unwrap(), Some("small".to_string()));
}

#[tokio::test]
async fn test_ttl_lazy_expiry() {
    let metrics = Arc::new(CacheMetrics::new());
    let engine = engine_with(256 * 1024 * 1024, Arc::clone(&metrics));

    engine
        .set(
            "default",
            "k",
            "v".into(),
            SetOptions {
                ttl: Some(1),
                ..SetOptions::default()
            },
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(engine.get("default", "k").unwrap(), None);
    assert_eq!(metrics.expired_keys(), 1);

    // Expired-on-read keys are fully dropped, not just hidden.
    let audit = engine.audit();
    assert_eq!(audit.entries, 0);
    assert_eq!(audit.lru_nodes, 0);
    assert_eq!(audit.used_bytes, 0);
}

#[test]
fn test_namespace_isolation() {
    let engine = engine();

    engine.set("t1", "k", "A".into(), set_opts()).unwrap();
    engine.set("t2", "k", "B".into(), set_opts()).unwrap();

    assert_eq!(engine.get("t1", "k").unwrap(), Some("A".to_string()));
    assert_eq!(engine.get("t2", "k").unwrap(), Some("B".to_string()));

    assert!(engine.flush_db("t1"));
    assert_eq!(engine.get("t1", "k").unwrap(), None);
    assert_eq!(engine.get("t2", "k").unwrap(), Some("B".to_string()));
}

#[test]
fn test_zrange_ordering_and_tie_break() {
    let engine = engine();
    let members = vec![
        ZsetMember { member: "m1".into(), score: 1.0 },
        ZsetMember { member: "m2".into(), score: 2.0 },
        ZsetMember { member: "m3".into(), score: 2.0 },
        ZsetMember { member: "m4".into(), score: 3.0 },
    ];
    engine.zadd("default", "z", members).unwrap();

    let all: Vec<String> = engine
        .zrange("default", "z", 0, -1)
        .unwrap()
        .into_iter()
        .map(|m| m.member)
        .collect();
    assert_eq!(all, vec!["m1", "m2", "m3", "m4"]);

    let ties: Vec<String> = engine
        .zrange_by_score("default", "z", 2.0, 2.0)
        .unwrap()
        .into_iter()
        .map(|m| m.member)
        .collect();
    assert_eq!(ties, vec!["m2", "m3"]);
}

#[test]
fn test_round_trip_laws() {
    let engine = engine();

    engine.set("default", "k", "v".into(), set_opts()).unwrap();
    assert_eq!(engine.get("default", "k").unwrap(), Some("v".to_string()));

    engine.hset("default", "h", "f".into(), "v".into()).unwrap();
    assert_eq!(engine.hget("default", "h", "f").unwrap(), Some("v".to_string()));

    engine
        .lpush("default", "l1", vec!["a".into(), "b".into(), "c".into()])
        .unwrap();
    assert_eq!(engine.lrange("default", "l1", 0, -1).unwrap(), vec!["c", "b", "a"]);

    engine
        .rpush("default", "l2", vec!["a".into(), "b".into(), "c".into()])
        .unwrap();
    assert_eq!(engine.lrange("default", "l2", 0, -1).unwrap(), vec!["a", "b", "c"]);

    assert_eq!(engine.sadd("default", "s", vec!["m".into()]).unwrap(), 1);
    assert_eq!(engine.sadd("default", "s", vec!["m".into()]).unwrap(), 0);
    assert!(engine.sismember("default", "s", "m").unwrap());

    engine
        .zadd("default", "z", vec![ZsetMember { member: "m".into(), score: 1.0 }])
        .unwrap();
    engine
        .zadd("default", "z", vec![ZsetMember { member: "m".into(), score: 2.0 }])
        .unwrap();
    assert_eq!(engine.zscore("default", "z", "m").unwrap(), Some(2.0));
    assert_eq!(engine.zcard("default", "z").unwrap(), 1);
}

#[test]
fn test_expire_persist_rename_laws() {
    let engine = engine();
    engine.set("default", "k", "v".into(), set_opts()).unwrap();

    assert!(engine.expire("default", "k", 30).unwrap());
    let ttl = engine.ttl("default", "k");
    assert!((29..=30).contains(&ttl), "ttl was {ttl}");

    assert!(engine.persist("default", "k").unwrap());
    assert_eq!(engine.ttl("default", "k"), -1);

    assert!(engine.expire("default", "k", 30).unwrap());
    assert!(engine.rename("default", "k", "k2").unwrap());
    assert_eq!(engine.get("default", "k").unwrap(), None);
    assert_eq!(engine.get("default", "k2").unwrap(), Some("v".to_string()));
    let ttl = engine.ttl("default", "k2");
    assert!((29..=30).contains(&ttl), "renamed ttl was {ttl}");
}

#[test]
fn test_missing_namespace_is_neutral() {
    let engine = engine();

    assert_eq!(engine.get("ghost", "k").unwrap(), None);
    assert_eq!(engine.exists("ghost", &["k".to_string()]), 0);
    assert_eq!(engine.del("ghost", &["k".to_string()]), 0);
    assert!(engine.keys("ghost", "*").is_empty());
    assert_eq!(engine.lrange("ghost", "l", 0, -1).unwrap(), Vec::<String>::new());
    assert_eq!(engine.ttl("ghost", "k"), -2);
    assert!(!engine.flush_db("ghost"));
}

#[test]
fn test_hits_and_misses_are_counted() {
    let metrics = Arc::new(CacheMetrics::new());
    let engine = engine_with(256 * 1024 * 1024, Arc::clone(&metrics));

    engine.set("default", "k", "v".into(), set_opts()).unwrap();
    engine.get("default", "k").unwrap();
    engine.get("default", "k").unwrap();
    engine.get("default", "missing").unwrap();

    assert_eq!(metrics.hits(), 2);
    assert_eq!(metrics.misses(), 1);

    let stats = engine.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.keys_total, 1);
}

#[test]
fn test_usedbytes_invariant_over_mixed_workload() {
    let engine = engine();

    engine.set("t1", "s", "hello".into(), set_opts()).unwrap();
    engine.hset("t1", "h", "f1".into(), "v1".into()).unwrap();
    engine.hset("t1", "h", "f2".into(), "v2".into()).unwrap();
    engine
        .rpush("t2", "l", vec!["a".into(), "b".into()])
        .unwrap();
    engine.lpop("t2", "l").unwrap();
    engine.sadd("t2", "set", vec!["x".into(), "y".into()]).unwrap();
    engine.srem("t2", "set", &["x".to_string()]).unwrap();
    engine.del("t1", &["s".to_string()]);
    engine.incr_by("t2", "n", 42).unwrap();

    let audit = engine.audit();
    assert_eq!(audit.used_bytes, audit.recomputed_bytes);
    assert_eq!(audit.entries, audit.lru_nodes);
}
