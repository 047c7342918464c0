use thiserror::Error;

/// Errors that can occur while talking to the chat backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected a file reference as expired or invalid.
    #[error("file reference is stale")]
    StaleReference,

    /// The message does not exist or carries no media.
    #[error("message {0} not found")]
    NotFound(i64),

    /// No usable backend connection.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// A network or transport-level error occurred.
    #[error("transport error: {0}")]
    Transport(String),

    /// The replay stream ended before covering the requested window.
    #[error("replay ended {missing} bytes short")]
    TruncatedReplay { missing: u64 },

    /// The client was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl BackendError {
    /// Returns `true` if re-resolving the message for a fresh file
    /// reference may fix the failure.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleReference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_reference_failures_are_stale() {
        assert!(BackendError::StaleReference.is_stale());
        assert!(!BackendError::NotFound(42).is_stale());
        assert!(!BackendError::Transport("reset".into()).is_stale());
        assert!(!BackendError::TruncatedReplay { missing: 10 }.is_stale());
        assert!(!BackendError::Unavailable("down".into()).is_stale());
    }
}
