//! Fleet membership: who is alive, and who leads.
//!
//! Each instance writes a JSON record with a TTL on every heartbeat and then
//! runs an election pass against a single leader key. There is no quorum; the
//! shared store is the only arbiter.

pub mod identity;
pub mod record;
pub mod registry;

pub use identity::InstanceIdentity;
pub use record::{InstanceRecord, InstanceView};
pub use registry::{InstanceRegistry, RegistryState};
