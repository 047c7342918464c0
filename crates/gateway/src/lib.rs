//! Core streaming pipeline for the Spout gateway.
//!
//! This crate ties the other layers together: it authorizes share links
//! against the file ledger, opens chunked byte windows through a backend
//! worker pool, and settles usage counters once a transfer ends. The HTTP
//! surface in `spout-server` is a thin shell over [`StreamingGateway`].

pub mod accounting;
pub mod builder;
pub mod error;
pub mod fetch;
pub mod gateway;

pub use accounting::{AccountingSink, TransferRecord};
pub use builder::GatewayBuilder;
pub use error::GatewayError;
pub use fetch::{ChunkFetcher, WindowStream, NATIVE_CHUNK_SIZE};
pub use gateway::{GatewayStats, StreamingGateway};
