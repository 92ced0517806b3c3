//! Store used when coordination is disabled.
//!
//! Every operation reports [`StoreError::Unavailable`], which sends all
//! dependents down their degraded path.

use async_trait::async_trait;

use crate::store::{CoordinationStore, SetOptions, StoreError};

/// A store that is never reachable.
///
/// Used when `store.backend = "none"` in configuration.
pub struct UnavailableStore;

impl UnavailableStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnavailableStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for UnavailableStore {
    async fn set(&self, _key: &str, _value: &str, _options: SetOptions) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn compare_and_delete(&self, _key: &str, _expected: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn scan_by_prefix(&self, _prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}
