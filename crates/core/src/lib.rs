//! Core types for the Spout streaming gateway.
//!
//! This crate defines the vocabulary shared by every other Spout crate:
//! link fingerprints and their truncated public tokens, resolved media
//! metadata with per-kind fallbacks, the durable file and session ledger
//! records, HTTP range resolution, and public link construction. It holds
//! no I/O and no async code.

pub mod fingerprint;
pub mod link;
pub mod media;
pub mod range;
pub mod session;

pub use fingerprint::{Fingerprint, TokenLength, link_fingerprint};
pub use link::LinkBuilder;
pub use media::{FileRecord, FileReference, MediaKind, MessageMeta};
pub use range::{ResolvedRange, resolve_range};
pub use session::StreamSession;
