//! Heartbeats, fleet enumeration and leader election.

use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::CoordinationConfig;
use crate::coordination::CoordinationContext;
use crate::instances::identity::resident_memory;
use crate::instances::record::{InstanceRecord, InstanceView};
use crate::store::{Expiry, SetOptions, StoreError};

/// Lifecycle of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Heartbeating,
    Shutdown,
    /// Coordination is off for the rest of the process lifetime.
    Disabled,
}

/// Publishes this instance's heartbeat and runs the election pass.
///
/// Leadership is eventually consistent: a dead leader is replaced within one
/// heartbeat interval after its record expires.
pub struct InstanceRegistry {
    ctx: CoordinationContext,
    state: Mutex<RegistryState>,
    cancel: CancellationToken,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl InstanceRegistry {
    pub fn new(ctx: CoordinationContext) -> Self {
        Self {
            ctx,
            state: Mutex::new(RegistryState::Uninitialized),
            cancel: CancellationToken::new(),
            heartbeat: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> RegistryState {
        *self.state.lock().await
    }

    pub fn context(&self) -> &CoordinationContext {
        &self.ctx
    }

    /// Start the heartbeat loop.
    ///
    /// Returns `false` and stays disabled when coordination is turned off or
    /// the store is unreachable at startup.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut state = self.state.lock().await;
        if *state != RegistryState::Uninitialized {
            return *state == RegistryState::Heartbeating;
        }

        if !self.ctx.config().enabled {
            tracing::info!("Coordination disabled by configuration");
            *state = RegistryState::Disabled;
            return false;
        }

        if !self.ctx.store().is_available() {
            tracing::warn!(
                instance_id = %self.ctx.instance_id(),
                "Coordination store unavailable at startup, running without heartbeats"
            );
            *state = RegistryState::Disabled;
            return false;
        }

        *state = RegistryState::Heartbeating;
        drop(state);

        let registry = Arc::clone(self);
        let cancel = self.cancel.child_token();
        let handle = tokio::spawn(async move {
            registry.run(cancel).await;
        });
        *self.heartbeat.lock().await = Some(handle);

        tracing::info!(
            instance_id = %self.ctx.instance_id(),
            project = %self.ctx.keys().project(),
            "Instance registry started"
        );
        true
    }

    async fn run(&self, cancel: CancellationToken) {
        loop {
            self.tick().await;

            let delay = heartbeat_delay(self.ctx.config(), &mut rand::rng());
            tracing::trace!(delay_ms = delay.as_millis() as u64, "Next heartbeat scheduled");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::debug!("Heartbeat loop stopped");
    }

    /// One heartbeat: publish the record, then run an election pass.
    ///
    /// Store errors are logged and swallowed. Does nothing once the registry
    /// is disabled or shut down.
    pub async fn tick(&self) {
        let state = self.state().await;
        if matches!(state, RegistryState::Disabled | RegistryState::Shutdown) {
            return;
        }

        if let Err(e) = self.publish().await {
            tracing::warn!(instance_id = %self.ctx.instance_id(), error = %e, "Heartbeat failed");
            return;
        }

        if let Err(e) = self.elect().await {
            tracing::warn!(instance_id = %self.ctx.instance_id(), error = %e, "Election pass failed");
        }
    }

    async fn publish(&self) -> Result<(), StoreError> {
        let record =
            InstanceRecord::from_identity(self.ctx.identity(), Timestamp::now(), resident_memory());
        let value = serde_json::to_string(&record)?;
        let key = self.ctx.keys().instance_key(self.ctx.instance_id());
        let ttl = Expiry::Seconds(self.ctx.config().key_expiry_secs);

        self.ctx
            .store()
            .set(&key, &value, SetOptions::expire_in(ttl))
            .await?;
        Ok(())
    }

    /// Election pass.
    ///
    /// A sole live instance always claims leadership. Otherwise a leader key
    /// naming no live instance is cleared (only if it still holds that stale
    /// value) and re-claimed with a conditional write, so concurrent
    /// challengers produce exactly one winner.
    pub async fn elect(&self) -> Result<(), StoreError> {
        let store = self.ctx.store();
        let me = self.ctx.instance_id();
        let leader_key = self.ctx.keys().leader_key();
        let live = self.live_records().await?;

        if let [only] = live.as_slice()
            && only.instance_id == me
        {
            let previous = store.get(&leader_key).await?;
            store.set(&leader_key, me, SetOptions::default()).await?;
            if previous.as_deref() != Some(me) {
                tracing::info!(instance_id = %me, "Sole live instance, assumed leadership");
            }
            return Ok(());
        }

        let current = store.get(&leader_key).await?;
        if let Some(leader) = &current
            && live.iter().any(|record| &record.instance_id == leader)
        {
            return Ok(());
        }

        if let Some(stale) = &current {
            tracing::debug!(stale_leader = %stale, "Leader key names no live instance");
            store.compare_and_delete(&leader_key, stale).await?;
        }

        let claimed = store
            .set(&leader_key, me, SetOptions::default().only_if_absent())
            .await?;
        if claimed {
            tracing::info!(instance_id = %me, live = live.len(), "Elected leader");
        }
        Ok(())
    }

    /// Records currently in the store whose heartbeat is fresh.
    async fn live_records(&self) -> Result<Vec<InstanceRecord>, StoreError> {
        let prefix = self.ctx.keys().instance_prefix();
        let entries = self.ctx.store().scan_by_prefix(&prefix).await?;
        let now = Timestamp::now();
        let ttl = self.ctx.config().key_expiry_secs;

        let records = entries
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_str::<InstanceRecord>(&value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Skipping unreadable instance record");
                    None
                }
            })
            .filter(|record| record.is_live(now, ttl))
            .collect();
        Ok(records)
    }

    /// Every live instance, flagged with whether it is the current leader.
    pub async fn get_all_instances(&self) -> Result<Vec<InstanceView>, StoreError> {
        let leader = self.leader_id().await?;
        let records = self.live_records().await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let is_master = leader.as_deref() == Some(record.instance_id.as_str());
                InstanceView { record, is_master }
            })
            .collect())
    }

    /// Instance id stored in the leader key, if any.
    pub async fn leader_id(&self) -> Result<Option<String>, StoreError> {
        self.ctx.store().get(&self.ctx.keys().leader_key()).await
    }

    /// Whether the leader key names this instance. `false` on any store error.
    pub async fn is_current_instance_master(&self) -> bool {
        match self.leader_id().await {
            Ok(leader) => leader.as_deref() == Some(self.ctx.instance_id()),
            Err(e) => {
                tracing::debug!(error = %e, "Leader lookup failed");
                false
            }
        }
    }

    /// Stop heartbeating and delete this instance's record.
    ///
    /// Other records and the leader key are left alone; the fleet re-elects
    /// on its next heartbeats.
    pub async fn shutdown(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, RegistryState::Shutdown)
        };

        self.cancel.cancel();
        if let Some(handle) = self.heartbeat.lock().await.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Heartbeat task ended abnormally");
        }

        if matches!(previous, RegistryState::Disabled | RegistryState::Shutdown) {
            return;
        }

        let key = self.ctx.keys().instance_key(self.ctx.instance_id());
        match self.ctx.store().delete(&key).await {
            Ok(_) => tracing::info!(instance_id = %self.ctx.instance_id(), "Instance record removed"),
            Err(e) => tracing::warn!(error = %e, "Failed to remove instance record, it will expire"),
        }
    }
}

/// Random delay in `[min, min + max)` seconds; exactly `min` when `max` is 0.
fn heartbeat_delay<R: Rng + ?Sized>(config: &CoordinationConfig, rng: &mut R) -> Duration {
    let min_ms = config.min_heartbeat_secs.saturating_mul(1000);
    let max_ms = min_ms.saturating_add(config.max_heartbeat_secs.saturating_mul(1000));
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rng.random_range(min_ms..max_ms))
}
