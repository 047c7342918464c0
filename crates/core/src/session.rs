//! Per-viewer session ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One viewer's transfer of a single file.
///
/// Opened when a download or stream request is accepted, closed when the
/// transfer completes or the client goes away. Sessions that never close
/// are swept once their inactivity window lapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSession {
    // -- Identity --
    pub session_id: String,
    pub message_id: i64,
    /// Owner of the file being streamed, `0` when the file has no ledger
    /// entry. Viewers themselves are anonymous.
    pub user_id: i64,

    // -- Client --
    pub ip_address: String,
    pub user_agent: String,

    // -- Activity --
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub bytes_sent: u64,
    pub is_active: bool,
}

impl StreamSession {
    /// Open a fresh session with a random id.
    #[must_use]
    pub fn begin(
        message_id: i64,
        user_id: i64,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            message_id,
            user_id,
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            started_at: now,
            last_active_at: now,
            bytes_sent: 0,
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sessions_are_active_and_empty() {
        let s = StreamSession::begin(42, 501, "203.0.113.9", "curl/8.5");
        assert!(s.is_active);
        assert_eq!(s.bytes_sent, 0);
        assert_eq!(s.message_id, 42);
        assert_eq!(s.user_id, 501);
        assert_eq!(s.started_at, s.last_active_at);
    }

    #[test]
    fn session_ids_are_unique() {
        let a = StreamSession::begin(1, 0, "127.0.0.1", "unknown");
        let b = StreamSession::begin(1, 0, "127.0.0.1", "unknown");
        assert_ne!(a.session_id, b.session_id);
    }
}
