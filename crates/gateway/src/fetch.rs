//! Chunked retrieval of exact byte windows.
//!
//! The backend replays media in fixed-size native chunks starting at a
//! chunk index. [`ChunkFetcher`] turns that into a byte-exact window: it
//! skips into the first chunk, trims past the requested end, and recovers
//! when the backend rejects a file reference as stale part-way through.
//!
//! A retry restarts the whole range read with freshly resolved metadata
//! and discards every byte the caller has already seen, so downstream
//! consumers observe no duplicated or missing bytes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use spout_backend::{BackendError, ChunkStream, DynChatClient};

use crate::error::GatewayError;

/// Native chunk granularity of backend replays.
pub const NATIVE_CHUNK_SIZE: u64 = 1024 * 1024;

/// Total attempts allowed while the backend keeps rejecting references
/// as stale.
const STALE_ATTEMPTS: u32 = 3;

/// Total attempts allowed for any other backend failure.
const OTHER_ATTEMPTS: u32 = 2;

/// Opens byte-exact chunk streams over backend media replays.
#[derive(Debug, Clone)]
pub struct ChunkFetcher {
    channel_id: i64,
    chunk_size: u64,
}

impl ChunkFetcher {
    /// A fetcher reading from `channel_id` at the backend's native chunk
    /// size.
    #[must_use]
    pub fn new(channel_id: i64) -> Self {
        Self {
            channel_id,
            chunk_size: NATIVE_CHUNK_SIZE,
        }
    }

    /// Override the chunk size. The value must match what the backend
    /// actually replays per chunk; tests pair this with a scripted client
    /// configured the same way.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Stream exactly the bytes `[start, end]` (inclusive) of the media
    /// behind `message_id`.
    ///
    /// Metadata is re-resolved on every attempt so each replay carries a
    /// fresh file reference. Callers must pass `start <= end`; resolved
    /// ranges uphold this.
    pub fn open_range(
        &self,
        client: Arc<dyn DynChatClient>,
        message_id: i64,
        start: u64,
        end: u64,
    ) -> WindowStream {
        debug!(message_id, start, end, "opening byte window");
        WindowStream::new(
            client,
            self.channel_id,
            self.chunk_size,
            message_id,
            start,
            end,
        )
    }
}

/// State carried across stream steps while a window is served.
struct WindowState {
    client: Arc<dyn DynChatClient>,
    channel_id: i64,
    chunk_size: u64,
    message_id: i64,
    /// First byte of the requested window.
    start: u64,
    /// Total bytes the window covers.
    window_len: u64,
    /// Bytes already handed to the caller, across all attempts.
    delivered: u64,
    /// Replay for the current attempt, if one is open.
    replay: Option<ChunkStream>,
    /// Bytes still to discard before the next caller-visible byte.
    skip: u64,
    /// Bytes still owed to the caller.
    remaining: u64,
    stale_attempts: u32,
    other_attempts: u32,
    /// Set once a terminal error has been yielded; the stream then ends.
    failed: bool,
}

impl WindowState {
    /// Open a replay with fresh metadata and restart the skip/trim
    /// bookkeeping, counting already-delivered bytes into the skip.
    async fn begin_attempt(&mut self) -> Result<(), BackendError> {
        let meta = self
            .client
            .resolve_message(self.channel_id, self.message_id)
            .await?
            .ok_or(BackendError::NotFound(self.message_id))?;
        let replay = self
            .client
            .open_replay(&meta, self.start / self.chunk_size)
            .await?;
        self.replay = Some(replay);
        self.skip = self.start % self.chunk_size + self.delivered;
        self.remaining = self.window_len - self.delivered;
        Ok(())
    }

    /// Cut the caller-visible part out of one native chunk.
    fn take(&mut self, chunk: &Bytes) -> Option<Bytes> {
        let len = chunk.len() as u64;
        if self.skip >= len {
            self.skip -= len;
            return None;
        }
        let from = usize::try_from(self.skip).unwrap_or(usize::MAX);
        self.skip = 0;
        let keep = usize::try_from(self.remaining.min(len - from as u64)).unwrap_or(usize::MAX);
        let piece = chunk.slice(from..from + keep);
        self.remaining -= piece.len() as u64;
        self.delivered += piece.len() as u64;
        Some(piece)
    }

    /// Decide whether `error` earns another attempt. `Ok(())` means retry;
    /// `Err` carries the terminal failure and fuses the stream.
    fn classify(&mut self, error: BackendError) -> Result<(), GatewayError> {
        self.replay = None;
        if error.is_stale() {
            self.stale_attempts += 1;
            if self.stale_attempts < STALE_ATTEMPTS {
                warn!(
                    message_id = self.message_id,
                    attempt = self.stale_attempts,
                    "stale file reference, re-resolving"
                );
                return Ok(());
            }
        } else {
            self.other_attempts += 1;
            if self.other_attempts < OTHER_ATTEMPTS {
                warn!(
                    message_id = self.message_id,
                    error = %error,
                    "chunk retrieval failed, retrying"
                );
                return Ok(());
            }
        }
        self.failed = true;
        Err(GatewayError::Retrieval {
            attempts: self.stale_attempts + self.other_attempts,
            source: error,
        })
    }

    /// Produce the next caller-visible chunk, retrying as allowed.
    async fn next_chunk(&mut self) -> Option<Result<Bytes, GatewayError>> {
        if self.failed {
            return None;
        }
        loop {
            let Some(replay) = self.replay.as_mut() else {
                match self.begin_attempt().await {
                    Ok(()) => continue,
                    Err(error) => match self.classify(error) {
                        Ok(()) => continue,
                        Err(terminal) => return Some(Err(terminal)),
                    },
                }
            };
            // Done before the backend necessarily is: stop as soon as the
            // window is covered, even if more chunks would follow.
            if self.remaining == 0 {
                return None;
            }
            match replay.next().await {
                Some(Ok(chunk)) => {
                    if let Some(piece) = self.take(&chunk) {
                        return Some(Ok(piece));
                    }
                }
                Some(Err(error)) => {
                    if let Err(terminal) = self.classify(error) {
                        return Some(Err(terminal));
                    }
                }
                None => {
                    let short = BackendError::TruncatedReplay {
                        missing: self.remaining,
                    };
                    if let Err(terminal) = self.classify(short) {
                        return Some(Err(terminal));
                    }
                }
            }
        }
    }
}

/// Lazy stream of byte pieces covering exactly one requested window.
///
/// Pieces arrive in ascending byte order with no gaps or duplicates,
/// including across internal retries. After yielding an error the stream
/// is fused and ends.
pub struct WindowStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, GatewayError>> + Send>>,
}

impl WindowStream {
    fn new(
        client: Arc<dyn DynChatClient>,
        channel_id: i64,
        chunk_size: u64,
        message_id: i64,
        start: u64,
        end: u64,
    ) -> Self {
        let state = WindowState {
            client,
            channel_id,
            chunk_size,
            message_id,
            start,
            window_len: end - start + 1,
            delivered: 0,
            replay: None,
            skip: 0,
            remaining: 0,
            stale_attempts: 0,
            other_attempts: 0,
            failed: false,
        };
        let inner = futures::stream::unfold(state, |mut state| async move {
            let item = state.next_chunk().await?;
            Some((item, state))
        });
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl Stream for WindowStream {
    type Item = Result<Bytes, GatewayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use spout_backend::{ScriptedClient, ScriptedFile, patterned_bytes};
    use spout_core::MediaKind;

    use super::*;

    const CHANNEL: i64 = -100_500;
    const CHUNK: usize = 1024;

    fn fixture(len: usize) -> (Arc<ScriptedClient>, Bytes) {
        let client = Arc::new(ScriptedClient::new("primary", CHANNEL).with_chunk_size(CHUNK));
        let content = patterned_bytes(len);
        client.insert_file(7, ScriptedFile::new(MediaKind::Video, content.clone()));
        (client, content)
    }

    fn fetcher() -> ChunkFetcher {
        ChunkFetcher::new(CHANNEL).with_chunk_size(CHUNK as u64)
    }

    async fn collect(mut stream: WindowStream) -> Result<Vec<u8>, GatewayError> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.extend_from_slice(&item?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn whole_file_reassembles_byte_identical() {
        let (client, content) = fixture(3000);
        let stream = fetcher().open_range(client.clone(), 7, 0, 2999);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content);
        assert_eq!(client.resolve_calls(), 1);
        assert_eq!(client.replay_calls(), 1);
    }

    #[tokio::test]
    async fn middle_window_skips_and_trims() {
        let (client, content) = fixture(3000);
        let stream = fetcher().open_range(client, 7, 100, 1500);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content.slice(100..=1500));
    }

    #[tokio::test]
    async fn window_inside_a_later_chunk() {
        let (client, content) = fixture(3000);
        let stream = fetcher().open_range(client.clone(), 7, 1030, 1100);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content.slice(1030..=1100));
    }

    #[tokio::test]
    async fn chunk_aligned_window_needs_no_skip_or_trim() {
        let (client, content) = fixture(3000);
        let stream = fetcher().open_range(client, 7, 1024, 2047);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content.slice(1024..2048));
    }

    #[tokio::test]
    async fn stops_once_the_window_is_covered() {
        let (client, content) = fixture(3000);
        let stream = fetcher().open_range(client.clone(), 7, 0, 10);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content.slice(0..=10));
        assert_eq!(client.replay_calls(), 1);
    }

    #[tokio::test]
    async fn stale_open_retry_is_invisible_to_the_caller() {
        let (client, content) = fixture(3000);
        client.fail_replays_stale(1);
        let stream = fetcher().open_range(client.clone(), 7, 0, 2999);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content);
        // Fresh metadata is fetched for every attempt.
        assert_eq!(client.resolve_calls(), 2);
        assert_eq!(client.replay_calls(), 2);
    }

    #[tokio::test]
    async fn stale_failures_exhaust_after_three_attempts() {
        let (client, _) = fixture(3000);
        client.fail_replays_stale(3);
        let stream = fetcher().open_range(client.clone(), 7, 0, 2999);

        let err = collect(stream).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Retrieval {
                attempts: 3,
                source: BackendError::StaleReference,
            }
        ));
        assert_eq!(client.resolve_calls(), 3);
    }

    #[tokio::test]
    async fn mid_stream_stale_discards_delivered_bytes() {
        let (client, content) = fixture(3000);
        client.fail_stale_after_first_chunk(1);
        let stream = fetcher().open_range(client.clone(), 7, 0, 2999);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content);
        assert_eq!(client.replay_calls(), 2);
    }

    #[tokio::test]
    async fn mid_stream_stale_inside_a_ranged_window() {
        let (client, content) = fixture(3000);
        client.fail_stale_after_first_chunk(1);
        let stream = fetcher().open_range(client, 7, 100, 2999);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content.slice(100..3000));
    }

    #[tokio::test]
    async fn transport_failure_is_retried_once() {
        let (client, content) = fixture(3000);
        client.fail_replays_transport(1);
        let stream = fetcher().open_range(client.clone(), 7, 0, 2999);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content);
        assert_eq!(client.replay_calls(), 2);
    }

    #[tokio::test]
    async fn repeated_transport_failures_are_terminal() {
        let (client, _) = fixture(3000);
        client.fail_replays_transport(2);
        let stream = fetcher().open_range(client, 7, 0, 2999);

        let err = collect(stream).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Retrieval {
                attempts: 2,
                source: BackendError::Transport(_),
            }
        ));
    }

    #[tokio::test]
    async fn short_replay_is_terminal_after_one_retry() {
        let (client, content) = fixture(3000);
        let mut stream = fetcher().open_range(client, 7, 0, 4095);

        let mut seen = Vec::new();
        let err = loop {
            match stream.next().await {
                Some(Ok(chunk)) => seen.extend_from_slice(&chunk),
                Some(Err(err)) => break err,
                None => panic!("stream ended without an error"),
            }
        };
        assert_eq!(seen, content);
        assert!(matches!(
            err,
            GatewayError::Retrieval {
                attempts: 2,
                source: BackendError::TruncatedReplay { missing: 1096 },
            }
        ));
        // After a terminal error the stream is fused.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn transient_resolve_failure_is_retried() {
        let (client, content) = fixture(3000);
        client.fail_resolves_transport(1);
        let stream = fetcher().open_range(client.clone(), 7, 0, 2999);

        let out = collect(stream).await.unwrap();
        assert_eq!(out, content);
        assert_eq!(client.resolve_calls(), 2);
        assert_eq!(client.replay_calls(), 1);
    }

    #[tokio::test]
    async fn vanished_message_fails_after_one_retry() {
        let (client, _) = fixture(3000);
        client.remove_file(7);
        let stream = fetcher().open_range(client, 7, 0, 2999);

        let err = collect(stream).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Retrieval {
                attempts: 2,
                source: BackendError::NotFound(7),
            }
        ));
    }
}
