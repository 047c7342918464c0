//! Verified worker pool with round-robin rotation.
//!
//! A deployment runs one primary connection plus zero or more worker
//! connections. The primary holds the read capability and serves every
//! chunk retrieval; workers hold the send capability and absorb fan-out
//! work. Each connection proves it can reach the storage channel at build
//! time: a failing worker is logged and excluded, a failing primary is
//! fatal because nothing could stream without it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{info, warn};

use crate::client::DynChatClient;
use crate::error::BackendError;

/// What a pooled connection is trusted to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Chunk retrieval from the storage channel.
    Read,
    /// Fan-out sends on behalf of the service.
    Send,
}

/// One pooled connection and its capability.
#[derive(Clone)]
pub struct WorkerHandle {
    pub client: Arc<dyn DynChatClient>,
    pub capability: Capability,
}

impl WorkerHandle {
    /// Identity of the underlying connection.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.client.identity()
    }
}

/// Pool of verified backend connections.
pub struct ClientPool {
    channel_id: i64,
    primary: WorkerHandle,
    senders: Vec<WorkerHandle>,
    cursor: AtomicUsize,
}

impl std::fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("channel_id", &self.channel_id)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl ClientPool {
    /// The storage channel every pooled connection was verified against.
    #[must_use]
    pub fn channel_id(&self) -> i64 {
        self.channel_id
    }

    /// The read-capable primary connection.
    #[must_use]
    pub fn reader(&self) -> &WorkerHandle {
        &self.primary
    }

    /// The next send-capable connection in round-robin order, or the
    /// primary when no workers survived verification.
    #[must_use]
    pub fn next_sender(&self) -> &WorkerHandle {
        if self.senders.is_empty() {
            return &self.primary;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        &self.senders[index]
    }

    /// Number of send-capable workers that survived verification.
    #[must_use]
    pub fn sender_count(&self) -> usize {
        self.senders.len()
    }
}

/// Builder that assembles and verifies a [`ClientPool`].
pub struct PoolBuilder {
    channel_id: i64,
    primary: Option<Arc<dyn DynChatClient>>,
    workers: Vec<Arc<dyn DynChatClient>>,
}

impl PoolBuilder {
    /// `channel_id` is the storage channel every connection must reach.
    #[must_use]
    pub fn new(channel_id: i64) -> Self {
        Self {
            channel_id,
            primary: None,
            workers: Vec::new(),
        }
    }

    /// Set the primary connection. Required.
    #[must_use]
    pub fn primary(mut self, client: Arc<dyn DynChatClient>) -> Self {
        self.primary = Some(client);
        self
    }

    /// Add one worker connection.
    #[must_use]
    pub fn worker(mut self, client: Arc<dyn DynChatClient>) -> Self {
        self.workers.push(client);
        self
    }

    /// Add a batch of worker connections.
    #[must_use]
    pub fn workers(mut self, clients: impl IntoIterator<Item = Arc<dyn DynChatClient>>) -> Self {
        self.workers.extend(clients);
        self
    }

    /// Verify every connection against the storage channel and assemble the
    /// pool. The primary must pass; workers that fail are excluded with a
    /// warning.
    pub async fn build(self) -> Result<ClientPool, BackendError> {
        let primary = self
            .primary
            .ok_or_else(|| BackendError::Configuration("a primary connection is required".into()))?;
        primary.verify_channel_access(self.channel_id).await?;

        let mut senders = Vec::new();
        for client in self.workers {
            match client.verify_channel_access(self.channel_id).await {
                Ok(()) => {
                    info!(worker = client.identity(), "worker verified");
                    senders.push(WorkerHandle {
                        client,
                        capability: Capability::Send,
                    });
                }
                Err(error) => {
                    warn!(
                        worker = client.identity(),
                        %error,
                        "worker cannot reach the storage channel, excluding from pool"
                    );
                }
            }
        }

        Ok(ClientPool {
            channel_id: self.channel_id,
            primary: WorkerHandle {
                client: primary,
                capability: Capability::Read,
            },
            senders,
            cursor: AtomicUsize::new(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::scripted::ScriptedClient;

    const CHANNEL: i64 = -100_500;

    fn client(name: &str) -> Arc<ScriptedClient> {
        Arc::new(ScriptedClient::new(name, CHANNEL))
    }

    async fn pool_of(workers: usize) -> ClientPool {
        let mut builder = PoolBuilder::new(CHANNEL).primary(client("primary"));
        for i in 0..workers {
            builder = builder.worker(client(&format!("worker-{i}")));
        }
        builder.build().await.unwrap()
    }

    #[tokio::test]
    async fn builder_requires_a_primary() {
        let err = PoolBuilder::new(CHANNEL).build().await.unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
    }

    #[tokio::test]
    async fn primary_verification_failure_is_fatal() {
        let primary = client("primary");
        primary.deny_channel_access();
        let err = PoolBuilder::new(CHANNEL)
            .primary(primary)
            .worker(client("worker-0"))
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn failing_workers_are_excluded() {
        let bad = client("worker-bad");
        bad.deny_channel_access();
        let pool = PoolBuilder::new(CHANNEL)
            .primary(client("primary"))
            .worker(client("worker-0"))
            .worker(bad)
            .worker(client("worker-2"))
            .build()
            .await
            .unwrap();

        assert_eq!(pool.sender_count(), 2);
        let seen: Vec<String> = (0..4)
            .map(|_| pool.next_sender().identity().to_owned())
            .collect();
        assert_eq!(seen, vec!["worker-0", "worker-2", "worker-0", "worker-2"]);
    }

    #[tokio::test]
    async fn rotation_is_even_and_ordered() {
        let pool = pool_of(3).await;
        let seen: Vec<String> = (0..9)
            .map(|_| pool.next_sender().identity().to_owned())
            .collect();
        assert_eq!(
            seen,
            vec![
                "worker-0", "worker-1", "worker-2", "worker-0", "worker-1", "worker-2",
                "worker-0", "worker-1", "worker-2",
            ]
        );
    }

    #[tokio::test]
    async fn empty_pool_falls_back_to_primary() {
        let pool = pool_of(0).await;
        assert_eq!(pool.sender_count(), 0);
        for _ in 0..3 {
            assert_eq!(pool.next_sender().identity(), "primary");
        }
        assert_eq!(pool.next_sender().capability, Capability::Read);
    }

    #[tokio::test]
    async fn capabilities_are_assigned_per_role() {
        let pool = pool_of(1).await;
        assert_eq!(pool.channel_id(), CHANNEL);
        assert_eq!(pool.reader().capability, Capability::Read);
        assert_eq!(pool.next_sender().capability, Capability::Send);
    }

    #[tokio::test]
    async fn concurrent_rotation_stays_balanced() {
        let pool = Arc::new(pool_of(5).await);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                (0..250)
                    .map(|_| pool.next_sender().identity().to_owned())
                    .collect::<Vec<_>>()
            }));
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for name in handle.await.unwrap() {
                *counts.entry(name).or_default() += 1;
            }
        }

        assert_eq!(counts.len(), 5);
        for (name, count) in counts {
            assert_eq!(count, 200, "uneven rotation for {name}");
        }
    }
}
