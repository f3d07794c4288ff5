//! Storage backend trait definition.

use async_trait::async_trait;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use mediasync_common::{Error, FileEntry, Result};

use crate::memory::MemorySession;
use crate::mount::MountSession;

/// Byte stream type for upload operations.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Backend-specific session payload.
///
/// A tagged variant rather than a downcast: backends match on their own
/// variant and nothing outside this crate ever inspects it.
pub(crate) enum SessionState {
    Memory(MemorySession),
    Mount(MountSession),
}

/// An authenticated session against a remote storage backend.
///
/// Opaque to everything except the backend that created it. A connection is
/// owned by at most one pool entry at a time, shared with request handlers
/// behind `Arc`, and closed exactly once by the pool.
pub struct Connection {
    id: Uuid,
    username: String,
    closed: AtomicBool,
    state: SessionState,
}

impl Connection {
    pub(crate) fn new(username: impl Into<String>, state: SessionState) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            closed: AtomicBool::new(false),
            state,
        }
    }

    /// Unique identifier for this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Username the session was established for.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the connection closed. Returns `true` only for the call that
    /// performed the transition, making `close` idempotent.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Storage backend contract.
///
/// Implementations authenticate with the *user's own* credential on
/// `connect` and map every failure into the common error taxonomy:
/// [`Error::Connect`], [`Error::Backend`], [`Error::NotFound`],
/// [`Error::AlreadyExists`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend name (e.g. "memory", "mount").
    fn name(&self) -> &str;

    /// Establish an authenticated session for `username`.
    ///
    /// # Errors
    /// - [`Error::Connect`] if the backend rejects the credential or is
    ///   unreachable
    async fn connect(&self, username: &str, password: &str) -> Result<Connection>;

    /// List the files in the user's namespace.
    ///
    /// An absent namespace (no uploads yet) is an empty listing, not an
    /// error.
    async fn list(&self, conn: &Connection, username: &str) -> Result<Vec<FileEntry>>;

    /// Store `data` under `name` in the user's namespace.
    ///
    /// # Errors
    /// - [`Error::AlreadyExists`] if `name` is already present
    /// - [`Error::Backend`] on I/O failure
    async fn upload(
        &self,
        conn: &Connection,
        username: &str,
        name: &str,
        data: ByteStream,
    ) -> Result<()>;

    /// Fetch the contents of `name`.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if `name` is absent
    async fn download(&self, conn: &Connection, username: &str, name: &str) -> Result<Vec<u8>>;

    /// Remove `name` from the user's namespace.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if `name` is absent
    /// - [`Error::Backend`] on I/O failure
    async fn delete(&self, conn: &Connection, username: &str, name: &str) -> Result<()>;

    /// Release the session.
    ///
    /// Idempotent: closing an already-closed connection is a no-op, never
    /// an error.
    async fn close(&self, conn: &Connection) -> Result<()>;
}

/// Reject operations on a connection that has already been closed.
pub(crate) fn ensure_open(conn: &Connection) -> Result<()> {
    if conn.is_closed() {
        return Err(Error::Backend("connection is closed".to_string()));
    }
    Ok(())
}

/// Collect an upload stream into memory.
pub(crate) async fn collect(mut stream: ByteStream) -> Result<Vec<u8>> {
    use futures::StreamExt;

    let mut data = Vec::new();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
    }
    Ok(data)
}

/// Wrap an in-memory buffer as a [`ByteStream`].
pub fn stream_from(data: Vec<u8>) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}
