//! Shared application state.

use std::sync::Arc;

use mediasync_auth::{Authenticator, EnvelopeManager};
use mediasync_storage::{ConnectionPool, StorageBackend};

/// State shared across all axum handlers.
///
/// Constructed once at startup with its dependencies injected; there is no
/// ambient singleton. The pool and envelope manager are both safe for
/// concurrent use without further synchronization.
pub struct AppState {
    /// Verifies login credentials.
    pub authenticator: Arc<dyn Authenticator>,
    /// Issues and validates credential envelopes.
    pub envelopes: EnvelopeManager,
    /// Per-user backend connection pool.
    pub pool: ConnectionPool,
    /// Storage backend the pool connects through.
    pub backend: Arc<dyn StorageBackend>,
}
