//! In-process coordination store.
//!
//! Backs single-node deployments and tests. Deadlines use the tokio clock so
//! tests running with paused time can expire keys with `tokio::time::advance`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;

use crate::store::{CoordinationStore, SetOptions, StoreError};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: &str, options: &SetOptions) -> Self {
        Self {
            value: value.to_string(),
            expires_at: options.expiry.map(|e| Instant::now() + e.as_duration()),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Memory store keyed by string with per-entry TTL.
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage (or recovery) of the shared store.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();

        // The entry guard holds the shard lock, so check-and-insert is atomic.
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if options.only_if_absent && !occupied.get().is_expired(now) {
                    return Ok(false);
                }
                occupied.insert(Entry::new(value, &options));
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::new(value, &options));
            }
        }
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();

        let live = self
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                // Expired, evict it
                self.entries.remove_if(key, |_, entry| entry.is_expired(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        Ok(self
            .entries
            .remove_if(key, |_, entry| !entry.is_expired(now) && entry.value == expected)
            .is_some())
    }

    async fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut found: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|item| item.key().starts_with(prefix) && !item.value().is_expired(now))
            .map(|item| (item.key().clone(), item.value().value.clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
