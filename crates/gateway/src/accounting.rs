//! Fire-and-forget settlement of usage counters.
//!
//! Transfers settle after the response body has gone out, so nothing here
//! may block or fail a request. Each counter update is attempted
//! independently on a background task; a store failure is logged and the
//! remaining updates still run.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::warn;

use spout_store::{FileStore, OwnerStats, SessionStore};

/// Everything needed to settle one finished transfer.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub session_id: String,
    pub message_id: i64,
    /// Owner credited with the bandwidth, `0` for files without a ledger
    /// entry.
    pub owner_id: i64,
    /// Bytes actually written to the client, which may be fewer than the
    /// requested window when the client went away.
    pub bytes_sent: u64,
}

/// Background writer for session, file, and owner counters.
#[derive(Clone)]
pub struct AccountingSink {
    files: Arc<dyn FileStore>,
    sessions: Arc<dyn SessionStore>,
    owners: Arc<dyn OwnerStats>,
    tracker: TaskTracker,
}

impl AccountingSink {
    pub fn new(
        files: Arc<dyn FileStore>,
        sessions: Arc<dyn SessionStore>,
        owners: Arc<dyn OwnerStats>,
    ) -> Self {
        Self {
            files,
            sessions,
            owners,
            tracker: TaskTracker::new(),
        }
    }

    /// Settle a finished transfer: final session byte count, session close,
    /// file access and byte counters, owner bandwidth.
    pub fn record_transfer(&self, record: TransferRecord) {
        let files = Arc::clone(&self.files);
        let sessions = Arc::clone(&self.sessions);
        let owners = Arc::clone(&self.owners);
        self.tracker.spawn(async move {
            if let Err(e) = sessions
                .add_bytes(&record.session_id, record.bytes_sent)
                .await
            {
                warn!(error = %e, session_id = %record.session_id, "session byte update failed");
            }
            if let Err(e) = sessions.close(&record.session_id).await {
                warn!(error = %e, session_id = %record.session_id, "session close failed");
            }
            if let Err(e) = files
                .record_access(record.message_id, record.bytes_sent)
                .await
            {
                warn!(error = %e, message_id = record.message_id, "file counter update failed");
            }
            if record.owner_id != 0 {
                if let Err(e) = owners
                    .add_bandwidth(record.owner_id, record.bytes_sent)
                    .await
                {
                    warn!(error = %e, owner_id = record.owner_id, "owner bandwidth update failed");
                }
            }
        });
    }

    /// Close a session that never transferred a byte, with no counter
    /// bumps. Used for `HEAD` probes and unsatisfiable range requests.
    pub fn abandon_session(&self, session_id: String) {
        let sessions = Arc::clone(&self.sessions);
        self.tracker.spawn(async move {
            if let Err(e) = sessions.close(&session_id).await {
                warn!(error = %e, session_id = %session_id, "session close failed");
            }
        });
    }

    /// Wait for every pending settlement task to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
