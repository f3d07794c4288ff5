//! The signed credential envelope.
//!
//! An envelope is a bearer token that embeds the username and a sealed copy
//! of the user's password, signed as a whole (HS256). The server keeps no
//! copy: the client replays the envelope on every request, and the password
//! is recovered from it on demand. Compromise of the signing or encryption
//! key compromises all outstanding envelopes; that trade-off is accepted in
//! exchange for a stateless server.

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

use mediasync_common::{Error, Password, Result};

use crate::credential::{self, KEY_LENGTH};

/// Claims carried by a credential envelope.
///
/// `encrypted_password` is the sealed form produced by
/// [`credential::seal`]; the remaining fields are the standard issuer and
/// timestamp claims, validated on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeClaims {
    /// Login name the envelope was issued for.
    pub username: String,
    /// `base64(nonce || ciphertext || tag)` of the user's password.
    pub encrypted_password: String,
    /// Issuer, matched against server configuration.
    pub iss: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Issues and validates credential envelopes.
///
/// Safe for concurrent use; holds only the two server keys, both zeroized
/// on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeManager {
    signing_key: Vec<u8>,
    encryption_key: [u8; KEY_LENGTH],
    #[zeroize(skip)]
    issuer: String,
    #[zeroize(skip)]
    lifetime: ChronoDuration,
    #[zeroize(skip)]
    validation: Validation,
}

impl EnvelopeManager {
    /// Create a manager from the two server-held keys.
    ///
    /// # Preconditions
    /// - `signing_key` must be non-empty
    /// - `encryption_key` must be exactly [`KEY_LENGTH`] bytes
    ///
    /// # Errors
    /// - [`Error::Config`] if either key is unusable or the lifetime does
    ///   not fit a timestamp
    pub fn new(
        signing_key: &[u8],
        encryption_key: &[u8],
        issuer: impl Into<String>,
        lifetime: Duration,
    ) -> Result<Self> {
        if signing_key.is_empty() {
            return Err(Error::Config("envelope signing key must not be empty".to_string()));
        }

        let encryption_key: [u8; KEY_LENGTH] = encryption_key.try_into().map_err(|_| {
            Error::Config(format!(
                "envelope encryption key must be exactly {} bytes",
                KEY_LENGTH
            ))
        })?;

        let lifetime = ChronoDuration::from_std(lifetime)
            .map_err(|_| Error::Config("envelope lifetime out of range".to_string()))?;

        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.leeway = 0;

        Ok(Self {
            signing_key: signing_key.to_vec(),
            encryption_key,
            issuer,
            lifetime,
            validation,
        })
    }

    /// Issue a signed envelope for `username`, embedding a sealed copy of
    /// `password`.
    ///
    /// # Postconditions
    /// - The returned token validates until `now + lifetime`
    /// - A fresh nonce is used for the embedded ciphertext
    pub fn generate(&self, username: &str, password: &str) -> Result<String> {
        let encrypted_password = credential::seal(&self.encryption_key, password)?;

        let now = Utc::now();
        let claims = EnvelopeClaims {
            username: username.to_string(),
            encrypted_password,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| Error::Serialization(format!("failed to sign envelope: {}", e)))
    }

    /// Validate an envelope and return its claims.
    ///
    /// Verifies the signature over the full token, the issuer, and the
    /// expiry. All failures collapse into [`Error::Authentication`] so a
    /// caller cannot probe which check rejected the token.
    pub fn validate(&self, token: &str) -> Result<EnvelopeClaims> {
        jsonwebtoken::decode::<EnvelopeClaims>(
            token,
            &DecodingKey::from_secret(&self.signing_key),
            &self.validation,
        )
        .map(|data| data.claims)
        .map_err(|_| Error::Authentication)
    }

    /// Recover the plaintext password from validated claims.
    ///
    /// # Errors
    /// - [`Error::Decryption`] if the embedded ciphertext is truncated or
    ///   fails authentication-tag verification
    pub fn decrypt_credential(&self, claims: &EnvelopeClaims) -> Result<Password> {
        credential::open(&self.encryption_key, &claims.encrypted_password)
    }

    /// Configured envelope lifetime.
    pub fn lifetime(&self) -> Duration {
        // Constructed via from_std, so the reverse conversion cannot fail.
        self.lifetime.to_std().unwrap_or(Duration::ZERO)
    }
}

impl std::fmt::Debug for EnvelopeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeManager")
            .field("issuer", &self.issuer)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SIGNING_KEY: &[u8] = b"test-signing-key";
    const ENCRYPTION_KEY: [u8; KEY_LENGTH] = [42u8; KEY_LENGTH];

    fn manager() -> EnvelopeManager {
        EnvelopeManager::new(
            SIGNING_KEY,
            &ENCRYPTION_KEY,
            "mediasync-test",
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    #[test]
    fn test_generate_validate_decrypt() {
        let manager = manager();

        let token = manager.generate("alice", "secret1").unwrap();
        let claims = manager.validate(&token).unwrap();

        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iss, "mediasync-test");
        assert!(claims.exp > claims.iat);

        let password = manager.decrypt_credential(&claims).unwrap();
        assert_eq!(password.as_str(), "secret1");
    }

    #[test]
    fn test_expired_envelope_rejected() {
        let manager = manager();

        // Hand-craft claims already past their expiry, signed with the
        // manager's own key.
        let now = Utc::now().timestamp();
        let claims = EnvelopeClaims {
            username: "alice".to_string(),
            encrypted_password: credential::seal(&ENCRYPTION_KEY, "secret1").unwrap(),
            iss: "mediasync-test".to_string(),
            iat: now - 100,
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SIGNING_KEY),
        )
        .unwrap();

        assert!(matches!(manager.validate(&token), Err(Error::Authentication)));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let manager = manager();
        let other = EnvelopeManager::new(
            SIGNING_KEY,
            &ENCRYPTION_KEY,
            "someone-else",
            Duration::from_secs(3600),
        )
        .unwrap();

        let token = other.generate("alice", "secret1").unwrap();
        assert!(matches!(manager.validate(&token), Err(Error::Authentication)));
    }

    #[test]
    fn test_wrong_signing_key_rejected() {
        let manager = manager();
        let other = EnvelopeManager::new(
            b"a-different-signing-key",
            &ENCRYPTION_KEY,
            "mediasync-test",
            Duration::from_secs(3600),
        )
        .unwrap();

        let token = other.generate("alice", "secret1").unwrap();
        assert!(matches!(manager.validate(&token), Err(Error::Authentication)));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let manager = manager();
        let token = manager.generate("alice", "secret1").unwrap();

        // Flip one character in the middle of the token.
        let mut bytes = token.into_bytes();
        let middle = bytes.len() / 2;
        bytes[middle] = if bytes[middle] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(matches!(manager.validate(&tampered), Err(Error::Authentication)));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let manager = manager();

        for token in ["", "garbage", "a.b", "a.b.c.d"] {
            assert!(matches!(manager.validate(token), Err(Error::Authentication)));
        }
    }

    #[test]
    fn test_wrong_encryption_key_fails_decrypt() {
        let manager = manager();
        let other = EnvelopeManager::new(
            SIGNING_KEY,
            &[7u8; KEY_LENGTH],
            "mediasync-test",
            Duration::from_secs(3600),
        )
        .unwrap();

        // Signature validates (same signing key), but the embedded
        // ciphertext was sealed under a different encryption key.
        let token = other.generate("alice", "secret1").unwrap();
        let claims = manager.validate(&token).unwrap();

        assert!(matches!(
            manager.decrypt_credential(&claims),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails_decrypt() {
        let manager = manager();
        let token = manager.generate("alice", "secret1").unwrap();
        let mut claims = manager.validate(&token).unwrap();

        let mut bytes = claims.encrypted_password.into_bytes();
        let middle = bytes.len() / 2;
        bytes[middle] = if bytes[middle] == b'A' { b'B' } else { b'A' };
        claims.encrypted_password = String::from_utf8(bytes).unwrap();

        assert!(matches!(
            manager.decrypt_credential(&claims),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn test_key_length_enforced() {
        assert!(matches!(
            EnvelopeManager::new(SIGNING_KEY, &[1u8; 16], "x", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EnvelopeManager::new(b"", &ENCRYPTION_KEY, "x", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_password_roundtrip(password in "\\PC{0,64}") {
            let manager = manager();

            let token = manager.generate("alice", &password).unwrap();
            let claims = manager.validate(&token).unwrap();
            let recovered = manager.decrypt_credential(&claims).unwrap();

            prop_assert_eq!(recovered.as_str(), password.as_str());
        }
    }
}
