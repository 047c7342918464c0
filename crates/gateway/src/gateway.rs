//! The streaming gateway orchestrator.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use spout_backend::{BackendError, ClientPool};
use spout_core::{FileRecord, MessageMeta, StreamSession, TokenLength};
use spout_store::{FileStore, OwnerStats, SessionStore};

use crate::accounting::{AccountingSink, TransferRecord};
use crate::error::GatewayError;
use crate::fetch::{ChunkFetcher, WindowStream};

/// Aggregate counters exposed to health and administrative surfaces.
#[derive(Debug, Clone, Copy)]
pub struct GatewayStats {
    /// Sessions currently marked active.
    pub active_sessions: u64,
    /// Send-capable workers that survived pool verification.
    pub sender_workers: usize,
    /// Bytes delivered across every file, all time.
    pub bytes_delivered: u64,
    /// Completed accesses across every file, all time.
    pub access_count: u64,
}

/// The central gateway that turns stored chat media into streamable links.
///
/// The pipeline for each download:
/// 1. Check the ledger for a revocation.
/// 2. Resolve live metadata through the pool's read-capable primary.
/// 3. Verify the supplied token against the recomputed fingerprint.
/// 4. Open a session, then stream the requested byte window.
/// 5. Settle session, file, and owner counters off the request path.
pub struct StreamingGateway {
    pub(crate) pool: Arc<ClientPool>,
    pub(crate) files: Arc<dyn FileStore>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) owners: Arc<dyn OwnerStats>,
    pub(crate) fetcher: ChunkFetcher,
    pub(crate) accounting: AccountingSink,
    pub(crate) token_length: TokenLength,
}

impl std::fmt::Debug for StreamingGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingGateway")
            .field("fetcher", &self.fetcher)
            .field("token_length", &self.token_length)
            .finish_non_exhaustive()
    }
}

impl StreamingGateway {
    /// The verified worker pool, for collaborators that need to send
    /// through a pooled connection themselves.
    #[must_use]
    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    /// Authorize one byte-serving request for `message_id` carrying the
    /// link token `token`.
    ///
    /// Revocation is checked before the backend is touched. On success the
    /// freshly resolved metadata is returned; its size and MIME type are
    /// what the response headers must advertise.
    pub async fn authorize(
        &self,
        message_id: i64,
        token: &str,
    ) -> Result<MessageMeta, GatewayError> {
        if self.files.is_revoked(message_id).await? {
            return Err(GatewayError::Revoked);
        }
        self.describe(message_id, token).await
    }

    /// Resolve and verify a link without consulting the revocation ledger.
    ///
    /// The player page uses this so an already rendered page keeps showing
    /// its metadata after the links under it die. Anything that serves
    /// bytes must go through [`StreamingGateway::authorize`] instead.
    pub async fn describe(
        &self,
        message_id: i64,
        token: &str,
    ) -> Result<MessageMeta, GatewayError> {
        let reader = self.pool.reader();
        let meta = match reader
            .client
            .resolve_message(self.pool.channel_id(), message_id)
            .await
        {
            Ok(meta) => meta,
            Err(BackendError::Unavailable(reason)) => {
                return Err(GatewayError::Unavailable(reason));
            }
            Err(error) => return Err(error.into()),
        };
        let meta = meta.ok_or(GatewayError::NotFound)?;

        if !meta.fingerprint().matches(token, self.token_length) {
            return Err(GatewayError::InvalidToken);
        }
        Ok(meta)
    }

    /// Open a session for an authorized request.
    ///
    /// The session is attributed to the file's ledger owner; files that
    /// were never ingested get the anonymous owner `0`.
    pub async fn open_session(
        &self,
        meta: &MessageMeta,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<StreamSession, GatewayError> {
        let owner_id = self
            .files
            .find_by_message_id(meta.message_id)
            .await?
            .map_or(0, |record| record.owner_id);

        let session = StreamSession::begin(meta.message_id, owner_id, ip_address, user_agent);
        self.sessions.create(session.clone()).await?;
        Ok(session)
    }

    /// Stream exactly the bytes `[start, end]` of the media behind
    /// `message_id`, through the read-capable primary.
    #[must_use]
    pub fn open_range(&self, message_id: i64, start: u64, end: u64) -> WindowStream {
        let client = Arc::clone(&self.pool.reader().client);
        self.fetcher.open_range(client, message_id, start, end)
    }

    /// Resolve a stored message and write its ledger entry, minting the
    /// public token embedded in share links.
    pub async fn register_file(
        &self,
        message_id: i64,
        owner_id: i64,
    ) -> Result<FileRecord, GatewayError> {
        let reader = self.pool.reader();
        let meta = reader
            .client
            .resolve_message(self.pool.channel_id(), message_id)
            .await?
            .ok_or(GatewayError::NotFound)?;

        let record = FileRecord::from_meta(&meta, owner_id, self.token_length);
        self.files.insert(record.clone()).await?;
        info!(
            message_id,
            owner_id,
            file = %record.file_name,
            "file registered"
        );
        Ok(record)
    }

    /// Revoke every link to a file. Returns whether the file was known.
    pub async fn revoke_file(&self, message_id: i64) -> Result<bool, GatewayError> {
        let known = self.files.revoke(message_id).await?;
        if known {
            info!(message_id, "file links revoked");
        }
        Ok(known)
    }

    /// Revoke every file an owner has registered. Returns the number of
    /// files newly revoked.
    pub async fn revoke_owner_files(&self, owner_id: i64) -> Result<u64, GatewayError> {
        let revoked = self.files.revoke_all_for(owner_id).await?;
        if revoked > 0 {
            info!(owner_id, revoked, "owner files revoked");
        }
        Ok(revoked)
    }

    /// Sessions still marked active, most recently started first.
    pub async fn active_sessions(&self) -> Result<Vec<StreamSession>, GatewayError> {
        Ok(self.sessions.active_sessions().await?)
    }

    /// Drop sessions with no activity inside `window`, whether or not they
    /// ever closed. Returns the number removed.
    pub async fn sweep_sessions(&self, window: Duration) -> Result<u64, GatewayError> {
        Ok(self.sessions.purge_stale(window).await?)
    }

    /// An owner's lifetime delivered bytes.
    pub async fn owner_bandwidth(&self, owner_id: i64) -> Result<u64, GatewayError> {
        Ok(self.owners.bandwidth_used(owner_id).await?)
    }

    /// Aggregate counters for health and administrative surfaces.
    pub async fn stats(&self) -> Result<GatewayStats, GatewayError> {
        Ok(GatewayStats {
            active_sessions: self.sessions.active_count().await?,
            sender_workers: self.pool.sender_count(),
            bytes_delivered: self.files.total_bytes_delivered().await?,
            access_count: self.files.total_access_count().await?,
        })
    }

    /// Settle a finished transfer off the request path.
    pub fn finish_transfer(&self, record: TransferRecord) {
        self.accounting.record_transfer(record);
    }

    /// Close a session that never transferred a byte.
    pub fn abandon_session(&self, session_id: String) {
        self.accounting.abandon_session(session_id);
    }

    /// Gracefully shut down, waiting for pending accounting tasks so no
    /// byte counts are lost.
    pub async fn shutdown(&self) {
        self.accounting.shutdown().await;
        info!("gateway shutdown complete");
    }
}
