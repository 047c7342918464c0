//! Scripted in-memory chat client.
//!
//! Behaves like a real backend for everything the gateway cares about:
//! messages resolve to metadata with a live file reference, media replays
//! in fixed-size chunks, and references can be invalidated out from under
//! a caller. Failures are injected by script, which makes this the client
//! used across the workspace's tests and by the built-in demo backend.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;

use spout_core::{FileReference, MediaKind, MessageMeta};

use crate::client::{ChatClient, ChunkStream};
use crate::error::BackendError;

/// Deterministic non-repeating content for synthetic files.
///
/// The byte at each position depends on the position, so reassembly bugs
/// (duplicated, dropped, or shifted bytes) change the output.
#[must_use]
pub fn patterned_bytes(len: usize) -> Bytes {
    let mut data = Vec::with_capacity(len);
    for i in 0..len {
        data.push((i.wrapping_mul(31) ^ (i >> 11)) as u8);
    }
    Bytes::from(data)
}

/// One synthetic stored file.
#[derive(Debug, Clone)]
pub struct ScriptedFile {
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_key: i64,
    pub content: Bytes,
}

impl ScriptedFile {
    #[must_use]
    pub fn new(kind: MediaKind, content: impl Into<Bytes>) -> Self {
        Self {
            kind,
            file_name: None,
            mime_type: None,
            file_key: 0,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    #[must_use]
    pub fn with_key(mut self, file_key: i64) -> Self {
        self.file_key = file_key;
        self
    }
}

/// In-memory [`ChatClient`] with scriptable failures.
pub struct ScriptedClient {
    client_name: String,
    channel_id: i64,
    chunk_size: usize,
    files: DashMap<i64, ScriptedFile>,
    /// Bumped by [`invalidate_references`](Self::invalidate_references);
    /// replays carrying a reference from an older generation fail stale.
    generation: AtomicU64,
    deny_access: AtomicBool,
    stale_replays: AtomicU32,
    broken_replays: AtomicU32,
    broken_resolves: AtomicU32,
    stale_after_first_chunk: AtomicU32,
    resolve_calls: AtomicU32,
    replay_calls: AtomicU32,
}

/// Consume one charge from a scripted failure counter.
fn take_scripted(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
}

impl ScriptedClient {
    /// A client named `name` serving `channel_id` with 1 MiB chunks.
    #[must_use]
    pub fn new(name: impl Into<String>, channel_id: i64) -> Self {
        Self {
            client_name: name.into(),
            channel_id,
            chunk_size: 1024 * 1024,
            files: DashMap::new(),
            generation: AtomicU64::new(0),
            deny_access: AtomicBool::new(false),
            stale_replays: AtomicU32::new(0),
            broken_replays: AtomicU32::new(0),
            broken_resolves: AtomicU32::new(0),
            stale_after_first_chunk: AtomicU32::new(0),
            resolve_calls: AtomicU32::new(0),
            replay_calls: AtomicU32::new(0),
        }
    }

    /// Override the native chunk size. Tests use small chunks to keep
    /// fixtures readable.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Store a file under `message_id`.
    pub fn insert_file(&self, message_id: i64, file: ScriptedFile) {
        self.files.insert(message_id, file);
    }

    /// Remove a file, as if the backing message was deleted.
    pub fn remove_file(&self, message_id: i64) {
        self.files.remove(&message_id);
    }

    /// Invalidate every previously issued file reference.
    pub fn invalidate_references(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// Make [`ChatClient::verify_channel_access`] fail from now on.
    pub fn deny_channel_access(&self) {
        self.deny_access.store(true, Ordering::Relaxed);
    }

    /// Fail the next `n` replay opens with a stale reference.
    pub fn fail_replays_stale(&self, n: u32) {
        self.stale_replays.store(n, Ordering::Relaxed);
    }

    /// Fail the next `n` replay opens with a transport error.
    pub fn fail_replays_transport(&self, n: u32) {
        self.broken_replays.store(n, Ordering::Relaxed);
    }

    /// Fail the next `n` resolves with a transport error.
    pub fn fail_resolves_transport(&self, n: u32) {
        self.broken_resolves.store(n, Ordering::Relaxed);
    }

    /// For the next `n` replays, yield one chunk and then fail stale.
    pub fn fail_stale_after_first_chunk(&self, n: u32) {
        self.stale_after_first_chunk.store(n, Ordering::Relaxed);
    }

    /// Number of resolves served so far.
    #[must_use]
    pub fn resolve_calls(&self) -> u32 {
        self.resolve_calls.load(Ordering::Relaxed)
    }

    /// Number of replay opens served so far.
    #[must_use]
    pub fn replay_calls(&self) -> u32 {
        self.replay_calls.load(Ordering::Relaxed)
    }

    fn current_reference(&self) -> FileReference {
        let generation = self.generation.load(Ordering::Relaxed);
        FileReference::new(generation.to_be_bytes().to_vec())
    }

    fn check_channel(&self, channel_id: i64) -> Result<(), BackendError> {
        if self.deny_access.load(Ordering::Relaxed) {
            return Err(BackendError::Transport("channel access denied".into()));
        }
        if channel_id != self.channel_id {
            return Err(BackendError::Transport(format!(
                "unknown channel {channel_id}"
            )));
        }
        Ok(())
    }
}

impl ChatClient for ScriptedClient {
    fn identity(&self) -> &str {
        &self.client_name
    }

    async fn verify_channel_access(&self, channel_id: i64) -> Result<(), BackendError> {
        self.check_channel(channel_id)
    }

    async fn resolve_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<Option<MessageMeta>, BackendError> {
        self.resolve_calls.fetch_add(1, Ordering::Relaxed);
        if take_scripted(&self.broken_resolves) {
            return Err(BackendError::Transport("scripted resolve failure".into()));
        }
        self.check_channel(channel_id)?;

        let Some(file) = self.files.get(&message_id) else {
            return Ok(None);
        };
        Ok(Some(MessageMeta {
            message_id,
            kind: file.kind,
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            file_size: file.content.len() as u64,
            file_key: file.file_key,
            reference: self.current_reference(),
        }))
    }

    async fn open_replay(
        &self,
        meta: &MessageMeta,
        start_chunk: u64,
    ) -> Result<ChunkStream, BackendError> {
        self.replay_calls.fetch_add(1, Ordering::Relaxed);
        if take_scripted(&self.stale_replays) {
            return Err(BackendError::StaleReference);
        }
        if take_scripted(&self.broken_replays) {
            return Err(BackendError::Transport("scripted replay failure".into()));
        }
        if meta.reference != self.current_reference() {
            return Err(BackendError::StaleReference);
        }
        let Some(file) = self.files.get(&meta.message_id) else {
            return Err(BackendError::NotFound(meta.message_id));
        };
        let content = file.content.clone();
        drop(file);

        let fail_mid_stream = take_scripted(&self.stale_after_first_chunk);
        let mut at = usize::try_from(start_chunk.saturating_mul(self.chunk_size as u64))
            .unwrap_or(usize::MAX)
            .min(content.len());

        let mut items: Vec<Result<Bytes, BackendError>> = Vec::new();
        while at < content.len() {
            let to = (at + self.chunk_size).min(content.len());
            items.push(Ok(content.slice(at..to)));
            at = to;
            if fail_mid_stream {
                items.push(Err(BackendError::StaleReference));
                break;
            }
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    const CHANNEL: i64 = -100_500;

    fn seeded_client() -> ScriptedClient {
        let client = ScriptedClient::new("primary", CHANNEL).with_chunk_size(1024);
        client.insert_file(
            7,
            ScriptedFile::new(MediaKind::Video, patterned_bytes(2560))
                .with_name("clip.mp4")
                .with_mime("video/mp4")
                .with_key(42),
        );
        client
    }

    async fn collect_ok(mut stream: ChunkStream) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        while let Some(item) = stream.next().await {
            chunks.push(item.unwrap());
        }
        chunks
    }

    #[tokio::test]
    async fn resolve_carries_live_metadata() {
        let client = seeded_client();
        let meta = client.resolve_message(CHANNEL, 7).await.unwrap().unwrap();
        assert_eq!(meta.display_name(), "clip.mp4");
        assert_eq!(meta.file_size, 2560);
        assert_eq!(meta.file_key, 42);
        assert_eq!(client.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_message_resolves_to_none() {
        let client = seeded_client();
        assert!(client.resolve_message(CHANNEL, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_channel_is_a_transport_error() {
        let client = seeded_client();
        let err = client.resolve_message(-1, 7).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn replay_chunks_at_native_boundaries() {
        let client = seeded_client();
        let meta = client.resolve_message(CHANNEL, 7).await.unwrap().unwrap();

        let chunks = collect_ok(client.open_replay(&meta, 0).await.unwrap()).await;
        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![1024, 1024, 512]);

        let chunks = collect_ok(client.open_replay(&meta, 1).await.unwrap()).await;
        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![1024, 512]);
        assert_eq!(chunks[0], patterned_bytes(2560).slice(1024..2048));

        let chunks = collect_ok(client.open_replay(&meta, 3).await.unwrap()).await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn old_references_go_stale() {
        let client = seeded_client();
        let meta = client.resolve_message(CHANNEL, 7).await.unwrap().unwrap();
        client.invalidate_references();

        let err = client.open_replay(&meta, 0).await.err().unwrap();
        assert!(err.is_stale());

        // A fresh resolve carries a working reference again.
        let meta = client.resolve_message(CHANNEL, 7).await.unwrap().unwrap();
        assert!(client.open_replay(&meta, 0).await.is_ok());
    }

    #[tokio::test]
    async fn scripted_stale_failures_are_consumed() {
        let client = seeded_client();
        client.fail_replays_stale(1);
        let meta = client.resolve_message(CHANNEL, 7).await.unwrap().unwrap();

        assert!(client.open_replay(&meta, 0).await.err().unwrap().is_stale());
        assert!(client.open_replay(&meta, 0).await.is_ok());
        assert_eq!(client.replay_calls(), 2);
    }

    #[tokio::test]
    async fn mid_stream_stale_yields_one_chunk_first() {
        let client = seeded_client();
        client.fail_stale_after_first_chunk(1);
        let meta = client.resolve_message(CHANNEL, 7).await.unwrap().unwrap();

        let mut stream = client.open_replay(&meta, 0).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().len(), 1024);
        assert!(stream.next().await.unwrap().unwrap_err().is_stale());
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn patterned_bytes_is_deterministic_and_positional() {
        let a = patterned_bytes(4096);
        let b = patterned_bytes(4096);
        assert_eq!(a, b);
        assert_ne!(a.slice(0..1024), a.slice(1024..2048));
    }
}
