use serde::{Deserialize, Serialize};

/// Identity of this pod, advertised through heartbeats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodIdentity {
    pub pod_id: String,
    pub region: String,
    pub endpoint: String,
}

/// One pod stanza inside a worker's location entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmPod {
    pub pod_id: String,
    pub region: String,
    pub endpoint: String,
    /// Epoch milliseconds; stanzas older than 60 s are dropped on read.
    pub last_heartbeat: i64,
    pub active_invocations: u32,
}

/// `location:<workerId>` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerLocation {
    pub worker_id: String,
    pub code_cid: String,
    pub warm_pods: Vec<WarmPod>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub updated_at: i64,
}

/// A deployed worker definition as persisted by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerDefinition {
    pub id: String,
    pub code_cid: String,
    pub name: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub active: bool,
}

/// `heartbeat:<podId>` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodHeartbeat {
    pub pod_id: String,
    pub region: String,
    pub endpoint: String,
    pub worker_count: usize,
    pub timestamp: i64,
}

/// Which tier answered a `GetWorker` lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupSource {
    Memory,
    Cache,
    Persistent,
}

/// A resolved worker plus how it was found.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerLookup {
    pub definition: WorkerDefinition,
    pub source: LookupSource,
    pub cold_start: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_wire_shape_is_camel_case() {
        let location = WorkerLocation {
            worker_id: "w1".into(),
            code_cid: "bafy123".into(),
            warm_pods: vec![WarmPod {
                pod_id: "pod-a".into(),
                region: "us-east".into(),
                endpoint: "http://pod-a:8080".into(),
                last_heartbeat: 123,
                active_invocations: 2,
            }],
            metadata: serde_json::json!({"lang": "js"}),
            updated_at: 456,
        };

        let json = serde_json::to_string(&location).unwrap();
        assert!(json.contains("\"workerId\""));
        assert!(json.contains("\"warmPods\""));
        assert!(json.contains("\"lastHeartbeat\""));
        assert!(json.contains("\"activeInvocations\""));
    }

    #[test]
    fn test_definition_metadata_defaults_to_null() {
        let def: WorkerDefinition = serde_json::from_str(
            r#"{"id":"w1","codeCid":"bafy","name":"worker","active":true}"#,
        )
        .unwrap();
        assert_eq!(def.metadata, serde_json::Value::Null);
        assert!(def.active);
    }
}
