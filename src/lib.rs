//! fleet-coord
//!
//! Leader election and exclusive job scheduling for a fleet of identical
//! instances sharing a key-value store.

use shadow_rs::shadow;
shadow!(build);

pub mod cli;
pub mod config;
pub mod coordination;
pub mod error;
pub mod instances;
pub mod jobs;
pub mod lock;
pub mod logger;
pub mod node;
pub mod store;

pub use node::{Node, RunningNode};

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
