//! Heartbeat records published by each instance.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::instances::identity::InstanceIdentity;

/// Record stored under `instances:{project}:{instance_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub instance_id: String,
    pub ip_address: String,
    pub host_name: String,
    pub environment_tag: String,
    pub started_at: Timestamp,
    pub last_update: Timestamp,
    /// Resident memory in bytes at the time of the heartbeat
    #[serde(default)]
    pub heap_total: u64,
}

impl InstanceRecord {
    pub fn from_identity(identity: &InstanceIdentity, now: Timestamp, heap_total: u64) -> Self {
        Self {
            instance_id: identity.instance_id.clone(),
            ip_address: identity.ip_address.clone(),
            host_name: identity.host_name.clone(),
            environment_tag: identity.environment_tag.clone(),
            started_at: identity.started_at,
            last_update: now,
            heap_total,
        }
    }

    /// A record not refreshed within `ttl_secs` is dead even if still readable.
    pub fn is_live(&self, now: Timestamp, ttl_secs: u64) -> bool {
        let age = now.as_second().saturating_sub(self.last_update.as_second());
        age < i64::try_from(ttl_secs).unwrap_or(i64::MAX)
    }
}

/// A live record together with its leadership, derived when listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceView {
    #[serde(flatten)]
    pub record: InstanceRecord,
    pub is_master: bool,
}
