//! Users-file authentication provider.
//!
//! Reads a JSON array of user records at construction and verifies
//! passwords against Argon2 PHC-format hashes.

use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use mediasync_common::{Error, Identity, Result};

use crate::provider::Authenticator;

/// A single record in the users file.
#[derive(Debug, Clone, Deserialize)]
struct UserRecord {
    username: String,
    /// Argon2 hash in PHC string format.
    password_hash: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: String,
}

/// Authentication provider backed by a local JSON users file.
pub struct LocalAuthenticator {
    users: HashMap<String, UserRecord>,
}

impl LocalAuthenticator {
    /// Load the users file.
    ///
    /// # Errors
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Config`] if it is not a valid JSON array of user records
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;

        let records: Vec<UserRecord> = serde_json::from_slice(&data)
            .map_err(|e| Error::Config(format!("failed to parse users file: {}", e)))?;

        let mut users = HashMap::new();
        for record in records {
            if users.insert(record.username.clone(), record).is_some() {
                warn!(path = %path.display(), "duplicate username in users file, keeping last");
            }
        }

        debug!(count = users.len(), "loaded users file");
        Ok(Self { users })
    }
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    fn name(&self) -> &str {
        "local"
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Identity> {
        let user = self.users.get(username).ok_or(Error::Authentication)?;

        let hash = PasswordHash::new(&user.password_hash).map_err(|_| Error::Authentication)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .map_err(|_| Error::Authentication)?;

        Ok(Identity {
            username: user.username.clone(),
            account_name: format!("local:{}", user.username),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
        })
    }
}
