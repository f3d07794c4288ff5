//! Storage backend abstraction and per-user connection pooling for MediaSync.
//!
//! This module provides a trait-based interface for remote storage backends
//! (a locally mounted share, an in-memory store for development) and the
//! pooled connection manager that caches one authenticated session per
//! username.
//!
//! # Design Principles
//! - Backend isolation: the pool and the HTTP layer never inspect which
//!   backend variant a connection belongs to
//! - Per-user sessions: every connection is established with the user's own
//!   credential, never a shared service identity
//! - Bounded lifetimes: idle sessions are reclaimed by a sweep whose
//!   lifetime is tied to the pool itself

pub mod backend;
pub mod factory;
pub mod memory;
pub mod mount;
pub mod pool;

pub use backend::{ByteStream, Connection, StorageBackend};
pub use factory::{create_backend, BackendConfig};
pub use memory::MemoryBackend;
pub use mount::MountBackend;
pub use pool::ConnectionPool;
