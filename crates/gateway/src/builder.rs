use std::sync::Arc;

use spout_backend::ClientPool;
use spout_core::TokenLength;
use spout_store::{FileStore, OwnerStats, SessionStore};

use crate::accounting::AccountingSink;
use crate::error::GatewayError;
use crate::fetch::{ChunkFetcher, NATIVE_CHUNK_SIZE};
use crate::gateway::StreamingGateway;

/// Fluent builder for constructing a [`StreamingGateway`] instance.
///
/// The verified worker pool and all three ledger implementations must be
/// supplied. Token length and chunk size default to the production values.
pub struct GatewayBuilder {
    pool: Option<Arc<ClientPool>>,
    files: Option<Arc<dyn FileStore>>,
    sessions: Option<Arc<dyn SessionStore>>,
    owners: Option<Arc<dyn OwnerStats>>,
    token_length: TokenLength,
    chunk_size: u64,
}

impl GatewayBuilder {
    /// Create a new builder with all optional fields set to their defaults.
    pub fn new() -> Self {
        Self {
            pool: None,
            files: None,
            sessions: None,
            owners: None,
            token_length: TokenLength::default(),
            chunk_size: NATIVE_CHUNK_SIZE,
        }
    }

    /// Set the verified worker pool.
    #[must_use]
    pub fn pool(mut self, pool: Arc<ClientPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Set the file ledger implementation.
    #[must_use]
    pub fn files(mut self, store: Arc<dyn FileStore>) -> Self {
        self.files = Some(store);
        self
    }

    /// Set the session ledger implementation.
    #[must_use]
    pub fn sessions(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Set the per-owner bandwidth store.
    #[must_use]
    pub fn owners(mut self, store: Arc<dyn OwnerStats>) -> Self {
        self.owners = Some(store);
        self
    }

    /// Set how many fingerprint characters public tokens expose.
    /// Out-of-range values are clamped the way [`TokenLength::new`] does.
    #[must_use]
    pub fn token_length(mut self, chars: usize) -> Self {
        self.token_length = TokenLength::new(chars);
        self
    }

    /// Override the backend's native chunk size. Tests pair this with a
    /// scripted client configured the same way.
    #[must_use]
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Consume the builder and produce a configured [`StreamingGateway`].
    ///
    /// Returns a [`GatewayError::Configuration`] if a required field has
    /// not been set or the chunk size is zero.
    pub fn build(self) -> Result<StreamingGateway, GatewayError> {
        let pool = self
            .pool
            .ok_or_else(|| GatewayError::Configuration("worker pool is required".into()))?;

        let files = self
            .files
            .ok_or_else(|| GatewayError::Configuration("file store is required".into()))?;

        let sessions = self
            .sessions
            .ok_or_else(|| GatewayError::Configuration("session store is required".into()))?;

        let owners = self
            .owners
            .ok_or_else(|| GatewayError::Configuration("owner stats store is required".into()))?;

        if self.chunk_size == 0 {
            return Err(GatewayError::Configuration(
                "chunk size must be non-zero".into(),
            ));
        }

        let fetcher = ChunkFetcher::new(pool.channel_id()).with_chunk_size(self.chunk_size);
        let accounting = AccountingSink::new(
            Arc::clone(&files),
            Arc::clone(&sessions),
            Arc::clone(&owners),
        );

        Ok(StreamingGateway {
            pool,
            files,
            sessions,
            owners,
            fetcher,
            accounting,
            token_length: self.token_length,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
