//! Chat backend access for the Spout streaming gateway.
//!
//! Spout treats the chat platform as an opaque blob host: messages are
//! resolved to media metadata and media is replayed in fixed-size chunks.
//! This crate defines the client traits for that contract, the verified
//! worker pool that rotates fan-out work across connections, and a
//! scripted in-memory client used by tests and the built-in demo backend.
//! It deliberately contains no wire protocol; deployments bring their own
//! [`ChatClient`] implementation.

pub mod client;
pub mod error;
pub mod pool;
pub mod scripted;

pub use client::{ChatClient, ChunkStream, DynChatClient};
pub use error::BackendError;
pub use pool::{Capability, ClientPool, PoolBuilder, WorkerHandle};
pub use scripted::{ScriptedClient, ScriptedFile, patterned_bytes};
