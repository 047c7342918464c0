//! In-memory ledger implementations backed by `DashMap`.
//!
//! Suitable for development, tests, and single-node deployments that can
//! afford to lose usage statistics on restart.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use spout_core::{FileRecord, StreamSession};

use crate::error::StoreError;
use crate::store::{FileStore, OwnerStats, SessionStore};

/// In-memory file ledger keyed by message id.
pub struct MemoryFileStore {
    records: DashMap<i64, FileRecord>,
}

impl MemoryFileStore {
    /// Create a new empty file ledger.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn insert(&self, record: FileRecord) -> Result<(), StoreError> {
        self.records.insert(record.message_id, record);
        Ok(())
    }

    async fn find_by_message_id(
        &self,
        message_id: i64,
    ) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.records.get(&message_id).map(|r| r.value().clone()))
    }

    async fn is_revoked(&self, message_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .records
            .get(&message_id)
            .is_some_and(|r| r.value().is_revoked))
    }

    async fn revoke(&self, message_id: i64) -> Result<bool, StoreError> {
        let Some(mut record) = self.records.get_mut(&message_id) else {
            return Ok(false);
        };
        if !record.is_revoked {
            record.is_revoked = true;
            record.revoked_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn revoke_all_for(&self, owner_id: i64) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut revoked = 0;
        for mut entry in self.records.iter_mut() {
            let record = entry.value_mut();
            if record.owner_id == owner_id && !record.is_revoked {
                record.is_revoked = true;
                record.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn record_access(&self, message_id: i64, bytes: u64) -> Result<(), StoreError> {
        if let Some(mut record) = self.records.get_mut(&message_id) {
            record.access_count += 1;
            record.bytes_delivered += bytes;
        }
        Ok(())
    }

    async fn total_bytes_delivered(&self) -> Result<u64, StoreError> {
        Ok(self.records.iter().map(|r| r.value().bytes_delivered).sum())
    }

    async fn total_access_count(&self) -> Result<u64, StoreError> {
        Ok(self.records.iter().map(|r| r.value().access_count).sum())
    }
}

/// In-memory session ledger keyed by session id.
pub struct MemorySessionStore {
    sessions: DashMap<String, StreamSession>,
}

impl MemorySessionStore {
    /// Create a new empty session ledger.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: StreamSession) -> Result<(), StoreError> {
        self.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<StreamSession>, StoreError> {
        Ok(self.sessions.get(session_id).map(|s| s.value().clone()))
    }

    async fn add_bytes(&self, session_id: &str, bytes: u64) -> Result<(), StoreError> {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.bytes_sent += bytes;
            session.last_active_at = Utc::now();
        }
        Ok(())
    }

    async fn close(&self, session_id: &str) -> Result<(), StoreError> {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.is_active = false;
            session.last_active_at = Utc::now();
        }
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<StreamSession>, StoreError> {
        let mut active: Vec<StreamSession> = self
            .sessions
            .iter()
            .filter(|s| s.value().is_active)
            .map(|s| s.value().clone())
            .collect();
        // Most recently started first.
        active.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(active)
    }

    async fn active_count(&self) -> Result<u64, StoreError> {
        Ok(self.sessions.iter().filter(|s| s.value().is_active).count() as u64)
    }

    async fn purge_stale(&self, window: Duration) -> Result<u64, StoreError> {
        let Ok(window) = chrono::Duration::from_std(window) else {
            return Ok(0);
        };
        let cutoff = Utc::now() - window;

        // Collect first: removing while iterating a DashMap can deadlock.
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.value().last_active_at < cutoff)
            .map(|s| s.key().clone())
            .collect();

        let mut removed = 0;
        for id in stale {
            if self.sessions.remove(&id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// In-memory per-owner bandwidth totals.
pub struct MemoryOwnerStats {
    bandwidth: DashMap<i64, u64>,
}

impl MemoryOwnerStats {
    /// Create a new empty stats table.
    pub fn new() -> Self {
        Self {
            bandwidth: DashMap::new(),
        }
    }
}

impl Default for MemoryOwnerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OwnerStats for MemoryOwnerStats {
    async fn add_bandwidth(&self, owner_id: i64, bytes: u64) -> Result<(), StoreError> {
        *self.bandwidth.entry(owner_id).or_insert(0) += bytes;
        Ok(())
    }

    async fn bandwidth_used(&self, owner_id: i64) -> Result<u64, StoreError> {
        Ok(self.bandwidth.get(&owner_id).map_or(0, |b| *b.value()))
    }
}
