//! Authentication and credential handling for MediaSync.
//!
//! This module provides:
//! - The signed credential envelope that carries an encrypted copy of the
//!   user's password back to the client
//! - Authenticated encryption of that password using XChaCha20-Poly1305
//! - The authentication provider contract and a local users-file provider
//!
//! # Security Guarantees
//! - Passwords and key material are zeroized when dropped
//! - No plaintext password, key, or token is ever logged
//! - Envelope rejection reasons are not distinguishable to callers

pub mod credential;
pub mod envelope;
pub mod local;
pub mod provider;

pub use credential::{KEY_LENGTH, NONCE_SIZE, TAG_SIZE};
pub use envelope::{EnvelopeClaims, EnvelopeManager};
pub use local::LocalAuthenticator;
pub use provider::{create_authenticator, AuthConfig, Authenticator};
