//! Storage backend for a locally mounted share.
//!
//! Rides an OS-level mount (NFS, SMB, or a plain directory): each user gets
//! a lazily created subdirectory under the configured root. Credential
//! verification is delegated to the gateway's authentication provider; the
//! session is scoped to the user's subtree.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use mediasync_common::{Error, FileEntry, Result};

use crate::backend::{collect, ensure_open, ByteStream, Connection, SessionState, StorageBackend};

/// Session payload: the user's directory under the mount root.
pub(crate) struct MountSession {
    dir: PathBuf,
}

/// Backend for a mounted share.
pub struct MountBackend {
    root: PathBuf,
}

impl MountBackend {
    /// Create a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    /// - [`Error::Io`] if the root cannot be created
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    fn session<'a>(&self, conn: &'a Connection) -> Result<&'a MountSession> {
        match conn.state() {
            SessionState::Mount(session) => Ok(session),
            _ => Err(Error::Backend(
                "connection does not belong to the mount backend".to_string(),
            )),
        }
    }

    fn file_path(&self, session: &MountSession, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(session.dir.join(name))
    }
}

/// Reject names that would escape the user's directory.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidInput(format!("invalid file name: {:?}", name)));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidInput(format!(
            "file name must not contain path separators: {:?}",
            name
        )));
    }
    Ok(())
}

/// Reject usernames that would escape the mount root.
fn validate_username(username: &str) -> Result<()> {
    if username.is_empty()
        || username == "."
        || username == ".."
        || username.contains('/')
        || username.contains('\\')
    {
        return Err(Error::InvalidInput(format!(
            "invalid username: {:?}",
            username
        )));
    }
    Ok(())
}

fn io_error(context: &str, error: std::io::Error) -> Error {
    Error::Backend(format!("{}: {}", context, error))
}

#[async_trait]
impl StorageBackend for MountBackend {
    fn name(&self) -> &str {
        "mount"
    }

    async fn connect(&self, username: &str, _password: &str) -> Result<Connection> {
        validate_username(username)?;

        // The mount itself is the authentication boundary here; verify it
        // is actually reachable before handing out a session.
        fs::metadata(&self.root)
            .await
            .map_err(|e| Error::Connect(format!("mount point unavailable: {}", e)))?;

        let session = MountSession {
            dir: self.root.join(username),
        };

        debug!(username, "mount backend session established");
        Ok(Connection::new(username, SessionState::Mount(session)))
    }

    async fn list(&self, conn: &Connection, _username: &str) -> Result<Vec<FileEntry>> {
        ensure_open(conn)?;
        let session = self.session(conn)?;

        // A user who has never uploaded has no directory yet.
        let mut dir = match fs::read_dir(&session.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("failed to read directory", e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| io_error("failed to read directory entry", e))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| io_error("failed to stat file", e))?;
            if !meta.is_file() {
                continue;
            }

            let modified: DateTime<Utc> = meta.modified().map(Into::into).unwrap_or_else(|_| Utc::now());
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: meta.len(),
                modified,
            });
        }
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
        let path = self.file_path(session, name)?;

        fs::create_dir_all(&session.dir)
            .await
            .map_err(|e| io_error("failed to create user directory", e))?;

        match fs::try_exists(&path).await {
            Ok(true) => return Err(Error::AlreadyExists(name.to_string())),
            Ok(false) => {}
            Err(e) => return Err(io_error("failed to check file", e)),
        }

        let data = collect(data).await?;
        fs::write(&path, &data)
            .await
            .map_err(|e| io_error("failed to write file", e))?;

        Ok(())
    }

    async fn download(&self, conn: &Connection, _username: &str, name: &str) -> Result<Vec<u8>> {
        ensure_open(conn)?;
        let session = self.session(conn)?;
        let path = self.file_path(session, name)?;

        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            Err(e) => Err(io_error("failed to read file", e)),
        }
    }

    async fn delete(&self, conn: &Connection, _username: &str, name: &str) -> Result<()> {
        ensure_open(conn)?;
        let session = self.session(conn)?;
        let path = self.file_path(session, name)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            Err(e) => Err(io_error("failed to delete file", e)),
        }
    }

    async fn close(&self, conn: &Connection) -> Result<()> {
        conn.mark_closed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::stream_from;

    fn backend() -> (tempfile::TempDir, MountBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = MountBackend::new(dir.path()).unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let (_dir, backend) = backend();
        let conn = backend.connect("alice", "pw").await.unwrap();

        backend
            .upload(&conn, "alice", "beach.jpg", stream_from(vec![1, 2, 3]))
            .await
            .unwrap();

        let data = backend.download(&conn, "alice", "beach.jpg").await.unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_absent_namespace_is_empty() {
        let (_dir, backend) = backend();
        let conn = backend.connect("alice", "pw").await.unwrap();

        assert!(backend.list(&conn, "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_reports_files() {
        let (_dir, backend) = backend();
        let conn = backend.connect("alice", "pw").await.unwrap();

        backend
            .upload(&conn, "alice", "b.jpg", stream_from(vec![1, 2]))
            .await
            .unwrap();
        backend
            .upload(&conn, "alice", "a.jpg", stream_from(vec![1]))
            .await
            .unwrap();

        let entries = backend.list(&conn, "alice").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.jpg");
        assert_eq!(entries[0].size, 1);
        assert_eq!(entries[1].name, "b.jpg");
        assert_eq!(entries[1].size, 2);
    }

    #[tokio::test]
    async fn test_duplicate_upload_rejected() {
        let (_dir, backend) = backend();
        let conn = backend.connect("alice", "pw").await.unwrap();

        backend
            .upload(&conn, "alice", "a.jpg", stream_from(vec![1]))
            .await
            .unwrap();

        assert!(matches!(
            backend
                .upload(&conn, "alice", "a.jpg", stream_from(vec![2]))
                .await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let (_dir, backend) = backend();
        let conn = backend.connect("alice", "pw").await.unwrap();

        backend
            .upload(&conn, "alice", "a.jpg", stream_from(vec![1]))
            .await
            .unwrap();
        backend.delete(&conn, "alice", "a.jpg").await.unwrap();

        assert!(matches!(
            backend.download(&conn, "alice", "a.jpg").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_names_rejected() {
        let (_dir, backend) = backend();
        let conn = backend.connect("alice", "pw").await.unwrap();

        for name in ["../escape.jpg", "a/b.jpg", "..", ".", ""] {
            assert!(matches!(
                backend.download(&conn, "alice", name).await,
                Err(Error::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_traversal_usernames_rejected() {
        let (_dir, backend) = backend();

        assert!(matches!(
            backend.connect("../root", "pw").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (_dir, backend) = backend();
        let alice = backend.connect("alice", "pw").await.unwrap();
        let bob = backend.connect("bob", "pw").await.unwrap();

        backend
            .upload(&alice, "alice", "a.jpg", stream_from(vec![1]))
            .await
            .unwrap();

        assert!(backend.list(&bob, "bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_dir, backend) = backend();
        let conn = backend.connect("alice", "pw").await.unwrap();

        backend.close(&conn).await.unwrap();
        backend.close(&conn).await.unwrap();

        assert!(matches!(
            backend.list(&conn, "alice").await,
            Err(Error::Backend(_))
        ));
    }
}
