//! Coordination store: the shared key/value substrate for the fleet.
//!
//! Backends:
//! - Redis (production; `SET NX PX`, Lua compare-and-delete, `SCAN`)
//! - Memory (single node and tests)
//! - Unavailable (coordination disabled)
//!
//! # Configuration
//!
//! ```toml
//! [store]
//! backend = "redis"  # or "memory" or "none"
//!
//! [store.redis]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 4
//! connection_timeout = 5
//! health_check_interval = 10
//! ```

mod error;
mod manager;
mod memory;
mod redis;
mod traits;
mod unavailable;

pub use error::StoreError;
pub use manager::StoreManager;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;
pub use traits::{CoordinationStore, Expiry, SetOptions};
pub use unavailable::UnavailableStore;

// Re-export config types
pub use crate::config::settings::{RedisStoreConfig, StoreBackend, StoreConfig};
