use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::glob::glob_match;

/// Per-subscriber sink depth. A subscriber that stays this far behind is
/// dropped rather than blocking the publisher.
const SINK_CAPACITY: usize = 64;

/// One message as delivered to subscriber sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubMessage {
    pub channel: String,
    pub message: String,
    #[serde(rename = "publisherId", skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<String>,
}

#[derive(Clone)]
struct Subscriber {
    id: Uuid,
    sink: mpsc::Sender<PubSubMessage>,
}

/// Process-local broker: exact channel table plus glob pattern table.
/// Delivery is best-effort in-order per subscriber; a failing sink drops
/// the subscription.
#[derive(Default)]
pub struct PubSubBroker {
    channels: DashMap<String, Vec<Subscriber>>,
    patterns: DashMap<String, Vec<Subscriber>>,
}

impl PubSubBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for exact channels and/or glob patterns.
    /// Returns the subscriber id and the receiving end of its sink.
    pub fn subscribe(
        &self,
        channels: Vec<String>,
        patterns: Vec<String>,
    ) -> (Uuid, mpsc::Receiver<PubSubMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SINK_CAPACITY);

        for channel in channels {
            self.channels.entry(channel).or_default().push(Subscriber {
                id,
                sink: tx.clone(),
            });
        }
        for pattern in patterns {
            self.patterns.entry(pattern).or_default().push(Subscriber {
                id,
                sink: tx.clone(),
            });
        }
        (id, rx)
    }

    /// Removes the subscriber from every channel and pattern set.
    pub fn unsubscribe(&self, id: Uuid) {
        self.channels.retain(|_, subs| {
            subs.retain(|s| s.id != id);
            !subs.is_empty()
        });
        self.patterns.retain(|_, subs| {
            subs.retain(|s| s.id != id);
            !subs.is_empty()
        });
    }

    /// Fans the message out to exact subscribers plus every matching
    /// pattern subscription. Returns the number of deliveries.
    pub fn publish(
        &self,
        channel: &str,
        message: &str,
        publisher_id: Option<String>,
    ) -> usize {
        let payload = PubSubMessage {
            channel: channel.to_string(),
            message: message.to_string(),
            publisher_id,
        };

        let mut delivered = 0;
        let mut dead = Vec::new();

        if let Some(mut subs) = self.channels.get_mut(channel) {
            for sub in subs.value_mut().iter() {
                if sub.sink.try_send(payload.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(sub.id);
                }
            }
        }

        for mut entry in self.patterns.iter_mut() {
            if !glob_match(entry.key(), channel) {
                continue;
            }
            for sub in entry.value_mut().iter() {
                if sub.sink.try_send(payload.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(sub.id);
                }
            }
        }

        for id in dead {
            tracing::warn!("dropping pub/sub subscriber {} with a failed sink", id);
            self.unsubscribe(id);
        }
        delivered
    }

    /// Active channel names, optionally filtered by a glob.
    pub fn channels(&self, pattern: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .filter(|name| pattern.map_or(true, |p| glob_match(p, name)))
            .collect();
        names.sort();
        names
    }

    /// Subscriber count per requested channel (0 for unknown channels).
    pub fn num_sub(&self, channels: &[String]) -> Vec<(String, usize)> {
        channels
            .iter()
            .map(|name| {
                let count = self.channels.get(name).map_or(0, |subs| subs.len());
                (name.clone(), count)
            })
            .collect()
    }

    /// Number of distinct pattern subscriptions.
    pub fn num_pat(&self) -> usize {
        self.patterns.iter().filter(|e| !e.value().is_empty()).count()
    }
}
