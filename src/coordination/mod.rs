//! Process-owned coordination context.
//!
//! Every component receives a [`CoordinationContext`] explicitly: it bundles
//! the shared store, the project's key space, the coordination settings and
//! the identity of this process.

mod keys;

pub use keys::KeySpace;

use std::sync::Arc;

use crate::config::CoordinationConfig;
use crate::instances::InstanceIdentity;
use crate::store::CoordinationStore;

/// Shared handles needed by the lock manager, registry and scheduler.
///
/// Cloning is cheap; the store and identity are reference counted.
#[derive(Clone)]
pub struct CoordinationContext {
    store: Arc<dyn CoordinationStore>,
    keys: KeySpace,
    config: CoordinationConfig,
    identity: Arc<InstanceIdentity>,
}

impl CoordinationContext {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        project: &str,
        config: CoordinationConfig,
        identity: InstanceIdentity,
    ) -> Self {
        let keys = KeySpace::new(project, config.lock_prefix.as_deref());
        Self {
            store,
            keys,
            config,
            identity: Arc::new(identity),
        }
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    pub fn identity(&self) -> &InstanceIdentity {
        &self.identity
    }

    pub fn instance_id(&self) -> &str {
        &self.identity.instance_id
    }
}

impl std::fmt::Debug for CoordinationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationContext")
            .field("project", &self.keys.project())
            .field("instance_id", &self.identity.instance_id)
            .field("store_available", &self.store.is_available())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::store::MemoryStore;

    pub(crate) const PROJECT: &str = "fleet-test";

    /// Context for `instance_id` over a store shared by simulated instances.
    pub(crate) fn context(store: &Arc<MemoryStore>, instance_id: &str) -> CoordinationContext {
        let store: Arc<dyn CoordinationStore> = store.clone();
        CoordinationContext::new(
            store,
            PROJECT,
            CoordinationConfig::default(),
            InstanceIdentity::with_id(instance_id),
        )
    }
}
