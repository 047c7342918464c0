//! File and session ledgers for the Spout streaming gateway.
//!
//! Defines the storage traits the gateway persists through, plus in-memory
//! implementations suitable for development, tests, and single-node
//! deployments.

pub mod error;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use memory::{MemoryFileStore, MemoryOwnerStats, MemorySessionStore};
pub use store::{FileStore, OwnerStats, SessionStore};
