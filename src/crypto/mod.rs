//! AES-256-GCM authenticated encryption for FLCK containers.
//!
//! Sealed blob layout: [ nonce (12 B) | ciphertext | GCM tag (16 B) ]
//!
//! The nonce is drawn fresh from the OS RNG on every call, so the caller only
//! ever handles one opaque blob.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng};
use aes_gcm::Aes256Gcm;
use thiserror::Error;

use crate::key::Key;

/// Byte length of the AES-GCM nonce prepended to every sealed blob.
pub const NONCE_LEN: usize = 12;
/// Byte length of the GCM authentication tag appended by the cipher.
pub const TAG_LEN: usize = 16;
/// Smallest blob `open` can accept: nonce + tag around an empty plaintext.
pub const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,
    /// Wrong key and corrupted data are deliberately one condition.
    #[error("incorrect password or corrupted file")]
    AuthenticationFailed,
}

/// Encrypt `plaintext` under `key`.
///
/// Returns `nonce (12 B) || ciphertext || GCM-tag (16 B)`.
pub fn seal(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;
    let nonce = Aes256Gcm::generate_nonce(&mut AeadOsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt and authenticate a blob produced by [`seal`].
///
/// Tag verification is constant-time inside `aes-gcm`. A blob too short to
/// hold a nonce and tag fails the same way a bad tag does.
pub fn open(key: &Key, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(CryptoError::AuthenticationFailed);
    }
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    let nonce = aes_gcm::Nonce::from_slice(&sealed[..NONCE_LEN]);
    cipher
        .decrypt(nonce, &sealed[NONCE_LEN..])
        .map_err(|_| CryptoError::AuthenticationFailed)
}
