//! Error types for the streaming pipeline.

use spout_backend::BackendError;
use spout_store::StoreError;
use thiserror::Error;

/// Errors surfaced by [`StreamingGateway`](crate::StreamingGateway) operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The supplied link token does not match the file's fingerprint.
    #[error("link token does not match")]
    InvalidToken,

    /// The file's share link has been revoked.
    #[error("share link revoked")]
    Revoked,

    /// The referenced message no longer exists or carries no media.
    #[error("file not found")]
    NotFound,

    /// No backend worker is able to serve the request right now.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Chunk retrieval kept failing after every allowed retry.
    #[error("retrieval failed after {attempts} attempts")]
    Retrieval {
        /// How many fetch attempts were made before giving up.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: BackendError,
    },

    /// A backend call outside the retry loop failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A ledger operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The gateway was assembled with missing or inconsistent settings.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Returns `true` when the caller supplied a token that does not match.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::InvalidToken)
    }

    /// Returns `true` when the share link was revoked.
    pub fn is_revoked(&self) -> bool {
        matches!(self, Self::Revoked)
    }

    /// Returns `true` when the referenced file could not be found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = GatewayError::Unavailable("no workers".into());
        assert_eq!(err.to_string(), "backend unavailable: no workers");

        let err = GatewayError::Retrieval {
            attempts: 3,
            source: BackendError::StaleReference,
        };
        assert_eq!(err.to_string(), "retrieval failed after 3 attempts");
    }

    #[test]
    fn retrieval_keeps_its_source() {
        let err = GatewayError::Retrieval {
            attempts: 2,
            source: BackendError::Transport("socket closed".into()),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("transport error: socket closed"));
    }

    #[test]
    fn classification_helpers() {
        assert!(GatewayError::InvalidToken.is_invalid_token());
        assert!(GatewayError::Revoked.is_revoked());
        assert!(GatewayError::NotFound.is_not_found());
        assert!(!GatewayError::NotFound.is_revoked());
    }
}
