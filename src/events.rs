use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

/// Everything observable about the cache lifecycle. Emitted synchronously
/// from inside the engine critical section; listeners must be non-blocking.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    KeySet { namespace: String, key: String },
    KeyGet { namespace: String, key: String },
    KeyDelete { namespace: String, key: String },
    KeyExpire { namespace: String, key: String },
    KeyEvict { namespace: String, key: String },
    InstanceCreate { instance_id: String, namespace: String },
    InstanceDelete { instance_id: String, namespace: String },
    NodeJoin { node_id: String },
    NodeLeave { node_id: String },
    AttestationRefresh { provider: String },
}

/// An emitted event plus its timestamp in epoch milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub timestamp: i64,
    #[serde(flatten)]
    pub event: CacheEvent,
}

type Listener = Box<dyn Fn(&EventRecord) + Send + Sync>;

/// Process-local listener set.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns a token usable with `unsubscribe`.
    pub fn subscribe<F>(&self, listener: F) -> u64
    where
        F: Fn(&EventRecord) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.lock();
        listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        let mut listeners = self.lock();
        listeners.retain(|(lid, _)| *lid != id);
    }

    pub fn emit(&self, event: CacheEvent) {
        let record = EventRecord {
            timestamp: Utc::now().timestamp_millis(),
            event,
        };
        let listeners = self.lock();
        for (_, listener) in listeners.iter() {
            listener(&record);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(CacheEvent::KeySet {
            namespace: "default".into(),
            key: "k".into(),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_removes_listener() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen2 = Arc::clone(&seen);
        let id = bus.subscribe(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });
        bus.unsubscribe(id);

        bus.emit(CacheEvent::NodeJoin {
            node_id: "pod-1".into(),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_event_serialization_shape() {
        let record = EventRecord {
            timestamp: 1,
            event: CacheEvent::KeyEvict {
                namespace: "t1".into(),
                key: "a".into(),
            },
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("key_evict"));
        assert!(json.contains("\"namespace\":\"t1\""));
    }
}
