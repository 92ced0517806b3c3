//! Named, time-bounded, ownership-tagged locks over the coordination store.
//!
//! A lock is a single `SET NX PX` write of a fresh owner token; release is a
//! compare-and-delete against that token, so a holder whose lock already
//! expired can never remove a lock re-acquired by someone else. Locks are not
//! renewed: the TTL must outlast the protected work.

mod manager;

pub use manager::{LockManager, OwnerToken};
