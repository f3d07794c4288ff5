//! In-memory storage backend for development and testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use mediasync_common::{Error, FileEntry, Result};

use crate::backend::{collect, ensure_open, ByteStream, Connection, SessionState, StorageBackend};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

/// One user's namespace, shared between the backend and its sessions.
type Namespace = Arc<RwLock<HashMap<String, StoredObject>>>;

/// Session payload: a handle scoped to the connecting user's namespace.
pub(crate) struct MemorySession {
    files: Namespace,
}

impl MemorySession {
    /// A session attached to a fresh, empty namespace. Used by pool tests
    /// that need connections without a real backend.
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

/// In-memory storage backend.
///
/// All data is held in process memory and lost on drop. In permissive mode
/// (no registered users) any credential is accepted, which is convenient
/// for development; with registered users, `connect` rejects mismatches
/// like a real backend would.
pub struct MemoryBackend {
    users: Option<HashMap<String, String>>,
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl MemoryBackend {
    /// Create a permissive backend that accepts any credential.
    pub fn new() -> Self {
        Self {
            users: None,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Create a backend that only accepts the given username/password
    /// pairs.
    pub fn with_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            users: Some(
                users
                    .into_iter()
                    .map(|(u, p)| (u.into(), p.into()))
                    .collect(),
            ),
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    fn namespace(&self, username: &str) -> Namespace {
        let mut namespaces = self.namespaces.write().unwrap();
        namespaces
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(HashMap::new())))
            .clone()
    }

    fn session<'a>(&self, conn: &'a Connection) -> Result<&'a MemorySession> {
        match conn.state() {
            SessionState::Memory(session) => Ok(session),
            _ => Err(Error::Backend(
                "connection does not belong to the memory backend".to_string(),
            )),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self, username: &str, password: &str) -> Result<Connection> {
        if let Some(users) = &self.users {
            match users.get(username) {
                Some(expected) if expected == password => {}
                _ => return Err(Error::Connect("invalid storage credentials".to_string())),
            }
        }

        let session = MemorySession {
            files: self.namespace(username),
        };

        debug!(username, "memory backend session established");
        Ok(Connection::new(username, SessionState::Memory(session)))
    }

    async fn list(&self, conn: &Connection, _username: &str) -> Result<Vec<FileEntry>> {
        ensure_open(conn)?;
        let session = self.session(conn)?;

        let files = session.files.read().unwrap();
        let mut entries: Vec<FileEntry> = files
            .iter()
            .map(|(name, object)| FileEntry {
                name: name.clone(),
                size: object.data.len() as u64,
                modified: object.modified,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(entries)
    }

    async fn upload(
        &self,
        conn: &Connection,
        _username: &str,
        name: &str,
        data: ByteStream,
    ) -> Result<()> {
        ensure_open(conn)?;
        let session = self.session(conn)?;

        // Collect before taking the lock; the stream may suspend.
        let data = collect(data).await?;

        let mut files = session.files.write().unwrap();
        if files.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        files.insert(
            name.to_string(),
            StoredObject {
                data,
                modified: Utc::now(),
            },
        );

        Ok(())
    }

    async fn download(&self, conn: &Connection, _username: &str, name: &str) -> Result<Vec<u8>> {
        ensure_open(conn)?;
        let session = self.session(conn)?;

        let files = session.files.read().unwrap();
        files
            .get(name)
            .map(|object| object.data.clone())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn delete(&self, conn: &Connection, _username: &str, name: &str) -> Result<()> {
        ensure_open(conn)?;
        let session = self.session(conn)?;

        let mut files = session.files.write().unwrap();
        files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn close(&self, conn: &Connection) -> Result<()> {
        conn.mark_closed();
        Ok(())
    }
}
