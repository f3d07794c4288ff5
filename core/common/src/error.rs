//! Common error types for MediaSync.

use thiserror::Error;

/// Top-level error type for MediaSync operations.
///
/// Credential failures are deliberately opaque: signature mismatch, wrong
/// issuer, and expiry all surface as [`Error::Authentication`] so that an
/// external caller cannot distinguish why a token was rejected.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential verification failed (bad signature, wrong issuer, expired
    /// envelope, or rejected login).
    #[error("authentication failed")]
    Authentication,

    /// Recovering the password from an envelope failed (truncated or
    /// tampered ciphertext, or authentication-tag mismatch).
    #[error("credential decryption failed")]
    Decryption,

    /// The storage backend rejected the credential or is unreachable.
    #[error("backend connect failed: {0}")]
    Connect(String),

    /// A backend operation failed after a session was established.
    #[error("backend error: {0}")]
    Backend(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The connection pool has been shut down.
    #[error("connection pool is closed")]
    PoolClosed,

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
