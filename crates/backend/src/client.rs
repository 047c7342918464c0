use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use spout_core::MessageMeta;

use crate::error::BackendError;

/// Stream of fixed-size media chunks replayed from the backend.
///
/// The backend decides the chunk size; items after the first error are
/// meaningless and consumers must stop.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

/// Strongly-typed chat backend client with native `async fn`.
///
/// This trait is **not** object-safe because it uses native `async fn`
/// methods (which desugar to opaque `impl Future` return types). If you need
/// dynamic dispatch, use [`DynChatClient`] instead -- every `ChatClient`
/// automatically implements `DynChatClient` via a blanket implementation.
pub trait ChatClient: Send + Sync {
    /// Stable identity of this connection, used in logs and pool wiring.
    fn identity(&self) -> &str;

    /// Verify this connection can read the given storage channel.
    fn verify_channel_access(
        &self,
        channel_id: i64,
    ) -> impl std::future::Future<Output = Result<(), BackendError>> + Send;

    /// Resolve a message to live media metadata, including a fresh file
    /// reference. Returns `None` when the message is absent or carries no
    /// media.
    fn resolve_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<MessageMeta>, BackendError>> + Send;

    /// Begin replaying media from the given chunk index onward.
    ///
    /// The metadata, and in particular its file reference, must come from a
    /// recent [`resolve_message`](Self::resolve_message) call; the backend
    /// rejects stale references either here or part-way through the stream.
    fn open_replay(
        &self,
        meta: &MessageMeta,
        start_chunk: u64,
    ) -> impl std::future::Future<Output = Result<ChunkStream, BackendError>> + Send;
}

/// Object-safe chat client trait for use behind `Arc<dyn DynChatClient>`.
///
/// Uses [`macro@async_trait`] to enable dynamic dispatch of async methods.
/// You generally should not implement this trait directly -- instead
/// implement [`ChatClient`] and rely on the blanket implementation.
#[async_trait]
pub trait DynChatClient: Send + Sync {
    /// Stable identity of this connection.
    fn identity(&self) -> &str;

    /// Verify this connection can read the given storage channel.
    async fn verify_channel_access(&self, channel_id: i64) -> Result<(), BackendError>;

    /// Resolve a message to live media metadata.
    async fn resolve_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<Option<MessageMeta>, BackendError>;

    /// Begin replaying media from the given chunk index onward.
    async fn open_replay(
        &self,
        meta: &MessageMeta,
        start_chunk: u64,
    ) -> Result<ChunkStream, BackendError>;
}

/// Blanket implementation: any type that implements [`ChatClient`] also
/// implements [`DynChatClient`], bridging the static and dynamic dispatch
/// worlds.
#[async_trait]
impl<T: ChatClient + Sync> DynChatClient for T {
    fn identity(&self) -> &str {
        ChatClient::identity(self)
    }

    async fn verify_channel_access(&self, channel_id: i64) -> Result<(), BackendError> {
        ChatClient::verify_channel_access(self, channel_id).await
    }

    async fn resolve_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<Option<MessageMeta>, BackendError> {
        ChatClient::resolve_message(self, channel_id, message_id).await
    }

    async fn open_replay(
        &self,
        meta: &MessageMeta,
        start_chunk: u64,
    ) -> Result<ChunkStream, BackendError> {
        ChatClient::open_replay(self, meta, start_chunk).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;

    use spout_core::{FileReference, MediaKind};

    use super::*;

    /// A fixed single-file client for exercising the trait and blanket impl.
    struct OneFileClient {
        client_name: String,
        channel_id: i64,
    }

    impl OneFileClient {
        fn meta(&self) -> MessageMeta {
            MessageMeta {
                message_id: 1,
                kind: MediaKind::Document,
                file_name: Some("notes.txt".to_owned()),
                mime_type: Some("text/plain".to_owned()),
                file_size: 5,
                file_key: 1,
                reference: FileReference::new(vec![0xAB]),
            }
        }
    }

    impl ChatClient for OneFileClient {
        fn identity(&self) -> &str {
            &self.client_name
        }

        async fn verify_channel_access(&self, channel_id: i64) -> Result<(), BackendError> {
            if channel_id == self.channel_id {
                Ok(())
            } else {
                Err(BackendError::Transport("no such channel".into()))
            }
        }

        async fn resolve_message(
            &self,
            channel_id: i64,
            message_id: i64,
        ) -> Result<Option<MessageMeta>, BackendError> {
            ChatClient::verify_channel_access(self, channel_id).await?;
            Ok((message_id == 1).then(|| self.meta()))
        }

        async fn open_replay(
            &self,
            meta: &MessageMeta,
            start_chunk: u64,
        ) -> Result<ChunkStream, BackendError> {
            if meta.reference != self.meta().reference {
                return Err(BackendError::StaleReference);
            }
            let chunks = if start_chunk == 0 {
                vec![Ok(Bytes::from_static(b"hello"))]
            } else {
                vec![]
            };
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    #[tokio::test]
    async fn blanket_impl_bridges_to_dyn() {
        let client: Arc<dyn DynChatClient> = Arc::new(OneFileClient {
            client_name: "primary".to_owned(),
            channel_id: -100,
        });

        assert_eq!(client.identity(), "primary");
        client.verify_channel_access(-100).await.unwrap();
        assert!(client.verify_channel_access(-200).await.is_err());

        let meta = client.resolve_message(-100, 1).await.unwrap().unwrap();
        assert_eq!(meta.display_name(), "notes.txt");
        assert!(client.resolve_message(-100, 2).await.unwrap().is_none());

        let mut replay = client.open_replay(&meta, 0).await.unwrap();
        let chunk = replay.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"hello");
        assert!(replay.next().await.is_none());
    }
}
