//! Authentication provider contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use mediasync_common::{Identity, Result};

/// Verifies a username/password pair against an identity source.
///
/// Providers only verify credentials and report identities; they never see
/// envelopes or storage sessions. A verified [`Identity`] feeds the
/// first-time creation of a credential envelope and is then discarded.
///
/// Failures must surface uniformly as [`mediasync_common::Error::Authentication`]
/// so an unknown user is indistinguishable from a wrong password.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Provider name (e.g. "local").
    fn name(&self) -> &str;

    /// Verify the credentials and return the identity on record.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Identity>;
}

/// Authentication provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Users-file provider with Argon2 password hashes.
    Local {
        /// Path to the JSON users file.
        users_file: PathBuf,
    },
}

/// Build the configured authentication provider.
///
/// Directory and federated providers (LDAP, OAuth2) are integrated behind
/// the [`Authenticator`] trait by the deployment, not by this crate.
pub fn create_authenticator(config: &AuthConfig) -> Result<Arc<dyn Authenticator>> {
    match config {
        AuthConfig::Local { users_file } => {
            Ok(Arc::new(crate::local::LocalAuthenticator::from_file(users_file)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_parses() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"kind": "local", "users_file": "/etc/mediasync/users.json"}"#)
                .unwrap();

        let AuthConfig::Local { users_file } = config;
        assert_eq!(users_file, PathBuf::from("/etc/mediasync/users.json"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: std::result::Result<AuthConfig, _> =
            serde_json::from_str(r#"{"kind": "kerberos"}"#);
        assert!(result.is_err());
    }
}
