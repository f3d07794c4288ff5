//! Password sealing using XChaCha20-Poly1305.
//!
//! The sealed form is `base64(nonce || ciphertext || tag)` with a fresh
//! random nonce per call. XChaCha20-Poly1305's 24-byte nonce is safe for
//! random generation, so nonce uniqueness per key holds without a counter.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng, generic_array::GenericArray},
    XChaCha20Poly1305,
};

use mediasync_common::{Error, Password, Result};

/// Required encryption key length in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt a plaintext password for embedding in a credential envelope.
///
/// # Postconditions
/// - Returns `base64(nonce || ciphertext || tag)`
/// - The nonce is freshly generated from the OS entropy source
///
/// # Errors
/// - Returns an error only if the cipher itself rejects the input
pub fn seal(key: &[u8; KEY_LENGTH], password: &str) -> Result<String> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, password.as_bytes())
        .map_err(|e| Error::Serialization(format!("password encryption failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(sealed))
}

/// Recover the plaintext password from its sealed form.
///
/// # Errors
/// Returns [`Error::Decryption`] if the input is not valid base64, is
/// shorter than `NONCE_SIZE + TAG_SIZE`, fails authentication-tag
/// verification (tampered or wrong-key ciphertext), or does not decode
/// to UTF-8.
pub fn open(key: &[u8; KEY_LENGTH], sealed: &str) -> Result<Password> {
    let data = BASE64.decode(sealed).map_err(|_| Error::Decryption)?;

    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Decryption);
    }

    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key));

    let plaintext = cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Decryption)?;

    let password = String::from_utf8(plaintext).map_err(|_| Error::Decryption)?;
    Ok(Password::new(password))
}
