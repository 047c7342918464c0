use thiserror::Error;

/// Errors from file, session, and owner ledger operations.
///
/// The in-memory ledgers are infallible; these variants carry the failure
/// modes of database-backed implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),
}
