use std::time::Duration;

use async_trait::async_trait;

use spout_core::{FileRecord, StreamSession};

use crate::error::StoreError;

/// Trait for the durable file ledger.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist the ledger entry for a newly ingested file, overwriting any
    /// previous entry for the same message.
    async fn insert(&self, record: FileRecord) -> Result<(), StoreError>;

    /// Fetch a file's ledger entry. `None` if the file was never ingested.
    async fn find_by_message_id(&self, message_id: i64)
    -> Result<Option<FileRecord>, StoreError>;

    /// Whether a file's links have been revoked. Files without a ledger
    /// entry are never revoked.
    async fn is_revoked(&self, message_id: i64) -> Result<bool, StoreError>;

    /// Revoke all links to a file. Returns whether the file was known;
    /// revoking twice keeps the original revocation time.
    async fn revoke(&self, message_id: i64) -> Result<bool, StoreError>;

    /// Revoke every file belonging to an owner. Returns the number of files
    /// newly revoked.
    async fn revoke_all_for(&self, owner_id: i64) -> Result<u64, StoreError>;

    /// Record one completed access and the bytes it delivered. Unknown
    /// files are ignored.
    async fn record_access(&self, message_id: i64, bytes: u64) -> Result<(), StoreError>;

    /// Sum of bytes delivered across every file.
    async fn total_bytes_delivered(&self) -> Result<u64, StoreError>;

    /// Sum of completed accesses across every file.
    async fn total_access_count(&self) -> Result<u64, StoreError>;
}

/// Trait for the per-viewer session ledger.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a freshly opened session.
    async fn create(&self, session: StreamSession) -> Result<(), StoreError>;

    /// Fetch a session by id.
    async fn get(&self, session_id: &str) -> Result<Option<StreamSession>, StoreError>;

    /// Add transferred bytes to a session and refresh its activity time.
    /// Unknown ids are ignored.
    async fn add_bytes(&self, session_id: &str, bytes: u64) -> Result<(), StoreError>;

    /// Mark a session inactive. Unknown ids are ignored.
    async fn close(&self, session_id: &str) -> Result<(), StoreError>;

    /// Sessions still marked active, most recently started first.
    async fn active_sessions(&self) -> Result<Vec<StreamSession>, StoreError>;

    /// Number of sessions still marked active.
    async fn active_count(&self) -> Result<u64, StoreError>;

    /// Drop sessions, active or not, with no activity inside `window`.
    /// Returns the number removed.
    async fn purge_stale(&self, window: Duration) -> Result<u64, StoreError>;
}

/// Trait for per-owner transfer totals.
#[async_trait]
pub trait OwnerStats: Send + Sync {
    /// Credit bytes to an owner's lifetime bandwidth.
    async fn add_bandwidth(&self, owner_id: i64, bytes: u64) -> Result<(), StoreError>;

    /// An owner's lifetime bandwidth. Zero for unknown owners.
    async fn bandwidth_used(&self, owner_id: i64) -> Result<u64, StoreError>;
}
