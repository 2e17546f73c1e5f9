use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::OwnerAddress;
use crate::errors::{CacheError, CacheResult};
use crate::events::{CacheEvent, EventBus};

/// One entry of the static plan catalog.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub max_memory_mb: u64,
    /// Subscription-billed plans are gated through the billing collaborator
    /// on every data-path resolve.
    pub subscription: bool,
    pub tee: bool,
}

/// The catalog is fixed at compile time.
pub fn plan_catalog() -> &'static [PlanSpec] {
    const PLANS: &[PlanSpec] = &[
        PlanSpec {
            id: "starter",
            name: "Starter",
            max_memory_mb: 64,
            subscription: false,
            tee: false,
        },
        PlanSpec {
            id: "standard",
            name: "Standard",
            max_memory_mb: 256,
            subscription: false,
            tee: false,
        },
        PlanSpec {
            id: "performance",
            name: "Performance",
            max_memory_mb: 1024,
            subscription: true,
            tee: false,
        },
        PlanSpec {
            id: "enclave",
            name: "Enclave",
            max_memory_mb: 256,
            subscription: true,
            tee: true,
        },
    ];
    PLANS
}

pub fn find_plan(id: &str) -> Option<&'static PlanSpec> {
    plan_catalog().iter().find(|plan| plan.id == id)
}

/// A provisioned instance: a namespace bound to an owner and a plan.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceRecord {
    pub id: Uuid,
    pub namespace: String,
    pub owner: OwnerAddress,
    pub plan_id: String,
    pub label: Option<String>,
    pub tee_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Result of a billing check for a subscription-billed namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Authorized,
    PaymentRequired { reason: String },
}

/// Billing collaborator seam. The default implementation authorizes
/// everything; deployments swap in a payment-protocol client.
#[async_trait]
pub trait BillingAuthorizer: Send + Sync {
    async fn authorize_subscription(&self, namespace: &str) -> SubscriptionStatus;
}

pub struct AllowAllBilling;

#[async_trait]
impl BillingAuthorizer for AllowAllBilling {
    async fn authorize_subscription(&self, _namespace: &str) -> SubscriptionStatus {
        SubscriptionStatus::Authorized
    }
}

/// In-memory registry of provisioned instances.
pub struct ProvisioningManager {
    instances: DashMap<Uuid, InstanceRecord>,
    by_namespace: DashMap<String, Uuid>,
    billing: Arc<dyn BillingAuthorizer>,
    events: Arc<EventBus>,
}

impl ProvisioningManager {
    pub fn new(billing: Arc<dyn BillingAuthorizer>, events: Arc<EventBus>) -> Self {
        Self {
            instances: DashMap::new(),
            by_namespace: DashMap::new(),
            billing,
            events,
        }
    }

    pub fn create_instance(
        &self,
        owner: OwnerAddress,
        plan_id: &str,
        namespace: Option<String>,
        label: Option<String>,
    ) -> CacheResult<InstanceRecord> {
        let plan = find_plan(plan_id)
            .ok_or_else(|| CacheError::invalid(format!("unknown plan '{plan_id}'")))?;

        let id = Uuid::new_v4();
        let namespace = namespace.unwrap_or_else(|| format!("inst-{id}"));
        if self.by_namespace.contains_key(&namespace) {
            return Err(CacheError::invalid(format!(
                "namespace '{namespace}' is already provisioned"
            )));
        }

        let record = InstanceRecord {
            id,
            namespace: namespace.clone(),
            owner,
            plan_id: plan.id.to_string(),
            label,
            tee_enabled: plan.tee,
            created_at: Utc::now(),
        };
        self.instances.insert(id, record.clone());
        self.by_namespace.insert(namespace.clone(), id);
        self.events.emit(CacheEvent::InstanceCreate {
            instance_id: id.to_string(),
            namespace,
        });
        Ok(record)
    }

    pub fn get_instance(&self, id: Uuid) -> Option<InstanceRecord> {
        self.instances.get(&id).map(|r| r.clone())
    }

    /// `ResolveInstance(namespace)` — the router's lookup.
    pub fn resolve_namespace(&self, namespace: &str) -> Option<InstanceRecord> {
        let id = *self.by_namespace.get(namespace)?;
        self.get_instance(id)
    }

    pub fn list_instances(&self, owner: &OwnerAddress) -> Vec<InstanceRecord> {
        let mut records: Vec<InstanceRecord> = self
            .instances
            .iter()
            .filter(|r| &r.owner == owner)
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Deletes the instance after verifying ownership.
    pub fn delete_instance(
        &self,
        id: Uuid,
        owner: &OwnerAddress,
    ) -> CacheResult<InstanceRecord> {
        let record = self
            .get_instance(id)
            .ok_or_else(|| CacheError::NotFound(format!("instance {id} not found")))?;
        if &record.owner != owner {
            return Err(CacheError::Unauthorized(
                "owner address does not match the instance owner".into(),
            ));
        }

        self.instances.remove(&id);
        self.by_namespace.remove(&record.namespace);
        self.events.emit(CacheEvent::InstanceDelete {
            instance_id: id.to_string(),
            namespace: record.namespace.clone(),
        });
        Ok(record)
    }

    /// Billing gate for subscription-billed namespaces.
    pub async fn authorize(&self, record: &InstanceRecord) -> CacheResult<()> {
        let Some(plan) = find_plan(&record.plan_id) else {
            return Ok(());
        };
        if !plan.subscription {
            return Ok(());
        }
        match self
            .billing
            .authorize_subscription(&record.namespace)
            .await
        {
            SubscriptionStatus::Authorized => Ok(()),
            SubscriptionStatus::PaymentRequired { reason } => {
                Err(CacheError::PaymentRequired(reason))
            }
        }
    }

    pub fn instance_count(&self) -> u64 {
        self.instances.len() as u64
    }

    pub fn tee_instance_count(&self) -> u64 {
        self.instances.iter().filter(|r| r.tee_enabled).count() as u64
    }
}
