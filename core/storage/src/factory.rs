//! Backend selection from configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use mediasync_common::Result;

use crate::backend::StorageBackend;
use crate::memory::MemoryBackend;
use crate::mount::MountBackend;

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-memory backend; data is lost on restart.
    Memory,
    /// Locally mounted share, one subdirectory per user.
    Mount {
        /// Mount point (or plain directory) holding the user directories.
        root: PathBuf,
    },
}

/// Build the configured storage backend.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn StorageBackend>> {
    match config {
        BackendConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
        BackendConfig::Mount { root } => Ok(Arc::new(MountBackend::new(root)?)),
    }
}
