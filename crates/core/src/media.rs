//! Media metadata resolved from backend messages.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::{Fingerprint, TokenLength, link_fingerprint};

/// Category of media attached to a backend message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Document,
    Video,
    Audio,
    Voice,
    VideoNote,
    Photo,
    Animation,
    Sticker,
}

impl MediaKind {
    /// Placeholder file name for media that carries none.
    #[must_use]
    pub fn fallback_name(self, message_id: i64) -> String {
        match self {
            Self::Video => format!("video_{message_id}.mp4"),
            Self::Audio => format!("audio_{message_id}.mp3"),
            Self::Voice => format!("voice_{message_id}.ogg"),
            Self::VideoNote => format!("video_note_{message_id}.mp4"),
            Self::Photo => format!("photo_{message_id}.jpg"),
            Self::Animation => format!("animation_{message_id}.mp4"),
            Self::Sticker => format!("sticker_{message_id}.webp"),
            Self::Document => format!("document_{message_id}"),
        }
    }

    /// MIME type assumed for media that does not declare one.
    #[must_use]
    pub fn fallback_mime(self) -> &'static str {
        match self {
            Self::Video | Self::VideoNote | Self::Animation => "video/mp4",
            Self::Audio => "audio/mpeg",
            Self::Voice => "audio/ogg",
            Self::Photo => "image/jpeg",
            Self::Sticker => "image/webp",
            Self::Document => "application/octet-stream",
        }
    }
}

/// Opaque, short-lived handle a backend issues for chunked media replay.
///
/// References go stale on the backend's schedule. Holders must be prepared
/// to resolve the message again for a fresh one and retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference(Bytes);

impl FileReference {
    #[must_use]
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Media metadata resolved from a live backend message.
///
/// `file_name` and `mime_type` are whatever the uploader declared and may
/// be missing or empty; [`MessageMeta::display_name`] and
/// [`MessageMeta::mime`] apply the per-kind fallbacks so callers always see
/// concrete values.
#[derive(Debug, Clone)]
pub struct MessageMeta {
    pub message_id: i64,
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: u64,
    /// Numeric identity of the stored blob. Backends that expose no
    /// separate file id fall back to the message id here.
    pub file_key: i64,
    pub reference: FileReference,
}

impl MessageMeta {
    /// Declared file name, or the per-kind placeholder when absent or empty.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.file_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => self.kind.fallback_name(self.message_id),
        }
    }

    /// Declared MIME type, or the per-kind fallback when absent or empty.
    #[must_use]
    pub fn mime(&self) -> String {
        match self.mime_type.as_deref() {
            Some(mime) if !mime.is_empty() => mime.to_owned(),
            _ => self.kind.fallback_mime().to_owned(),
        }
    }

    /// Link fingerprint over the resolved identity fields.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        link_fingerprint(
            &self.display_name(),
            self.file_size,
            &self.mime(),
            self.file_key,
        )
    }
}

/// Durable ledger entry for an ingested file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    // -- Identity --
    pub message_id: i64,
    pub owner_id: i64,

    // -- Resolved metadata --
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,

    // -- Link fingerprint --
    pub fingerprint: String,
    pub public_token: String,

    // -- Lifecycle --
    pub uploaded_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,

    // -- Usage counters --
    pub access_count: u64,
    pub bytes_delivered: u64,
}

impl FileRecord {
    /// Build the ledger entry for freshly resolved media.
    #[must_use]
    pub fn from_meta(meta: &MessageMeta, owner_id: i64, token_length: TokenLength) -> Self {
        let fingerprint = meta.fingerprint();
        Self {
            message_id: meta.message_id,
            owner_id,
            file_name: meta.display_name(),
            file_size: meta.file_size,
            mime_type: meta.mime(),
            public_token: fingerprint.token(token_length).to_owned(),
            fingerprint: fingerprint.to_string(),
            uploaded_at: Utc::now(),
            is_revoked: false,
            revoked_at: None,
            access_count: 0,
            bytes_delivered: 0,
        }
    }
}
