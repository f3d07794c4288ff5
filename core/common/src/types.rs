//! Common types used throughout MediaSync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// A verified user identity produced by an authentication provider.
///
/// Identities are never persisted; one is built per login and lives only
/// long enough to mint a credential envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Login name, also the key for the user's storage namespace.
    pub username: String,
    /// Canonical account name at the provider (e.g. a distinguished name,
    /// or `local:<username>` for the users-file provider).
    pub account_name: String,
    /// Email address on record.
    pub email: String,
    /// Human-readable display name.
    pub display_name: String,
}

/// Metadata for a single stored file as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name within the user's namespace.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// A plaintext password with secure memory handling.
///
/// The inner string is zeroized on drop and never appears in `Debug`
/// output. The only durable copy of a user's password lives inside the
/// client-held envelope; instances of this type are transient.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Password(String);

impl Password {
    /// Wrap a plaintext password.
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Borrow the plaintext.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the plaintext in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password([REDACTED])")
    }
}
