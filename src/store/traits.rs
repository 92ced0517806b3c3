//! CoordinationStore trait definition.

use async_trait::async_trait;

use crate::store::StoreError;

/// Key expiry attached to a write.
///
/// Heartbeat records expire in seconds and locks in milliseconds; the unit is
/// carried all the way to the backend instead of being normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Seconds(u64),
    Milliseconds(u64),
}

impl Expiry {
    pub fn as_duration(&self) -> std::time::Duration {
        match *self {
            Expiry::Seconds(secs) => std::time::Duration::from_secs(secs),
            Expiry::Milliseconds(ms) => std::time::Duration::from_millis(ms),
        }
    }
}

/// Options for [`CoordinationStore::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub expiry: Option<Expiry>,
    /// Write only when the key holds no value. Must be a single atomic
    /// store-side operation.
    pub only_if_absent: bool,
}

impl SetOptions {
    pub fn expire_in(expiry: Expiry) -> Self {
        Self {
            expiry: Some(expiry),
            only_if_absent: false,
        }
    }

    pub fn absent_with_expiry(expiry: Expiry) -> Self {
        Self {
            expiry: Some(expiry),
            only_if_absent: true,
        }
    }

    pub fn only_if_absent(mut self) -> Self {
        self.only_if_absent = true;
        self
    }
}

/// Contract over the shared key/value store used for fleet coordination.
///
/// When [`is_available`](CoordinationStore::is_available) is false every
/// other operation returns [`StoreError::Unavailable`] without doing any I/O.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Write a value. Returns `false` when `only_if_absent` was requested and
    /// the key already held a value.
    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<bool, StoreError>;

    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditionally delete a key. Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete `key` only if it currently holds `expected`, atomically.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// All live keys starting with `prefix`, with their values.
    async fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;

    /// Whether the store is currently reachable.
    fn is_available(&self) -> bool;
}
