//! Key material: password derivation (PBKDF2-HMAC-SHA256) and keyfiles.
//!
//! Password mode derives a fresh key per encryption from a random 32-byte
//! salt, and re-derives it at decryption time from the salt stored in the
//! container header. Keyfile mode uses the keyfile contents verbatim: the
//! 32 key bytes as URL-safe base64 (44 ASCII bytes).

use std::fmt;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::container::{Mode, SALT_LEN};

pub const KEY_LEN: usize = 32;
/// PBKDF2 work factor. Not stored in the container, so changing it is a
/// format change.
pub const PBKDF2_ITERATIONS: u32 = 480_000;
/// Minimum password length accepted for encryption, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// Length of an encoded keyfile.
pub const KEYFILE_LEN: usize = 44;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("a password is required for this file")]
    MissingPassword,
    #[error("password must be at least {min} characters long")]
    PasswordTooShort { min: usize },
    #[error("a key file is required for this file")]
    MissingKey,
    #[error("invalid key file")]
    InvalidKeyfile,
}

// ── Key ──────────────────────────────────────────────────────────────────────

/// A 256-bit symmetric key. Wiped on drop; compared in constant time.
#[derive(Clone)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// A new random key from the OS RNG.
    pub fn generate() -> Self {
        let mut key = Self([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key.0);
        key
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Keyfile encoding of this key.
    pub fn to_keyfile(&self) -> Vec<u8> {
        URL_SAFE.encode(self.0).into_bytes()
    }

    /// Short public identifier for telling keys apart. Reveals nothing usable
    /// about the key itself.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new_derive_key("flck keyfile fingerprint v1");
        hasher.update(&self.0);
        hex::encode(&hasher.finalize().as_bytes()[..8])
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.fingerprint())
    }
}

// ── KeyMaterial ──────────────────────────────────────────────────────────────

/// The resolved key for one operation, plus the salt when password-derived.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub key:  Key,
    pub salt: Option<[u8; SALT_LEN]>,
}

impl KeyMaterial {
    pub fn from_key(key: Key) -> Self {
        Self { key, salt: None }
    }

    /// Container mode matching how this key was obtained.
    pub fn mode(&self) -> Mode {
        match self.salt {
            Some(salt) => Mode::Password { salt },
            None       => Mode::Keyfile,
        }
    }
}

/// Derive a key from `password` with PBKDF2-HMAC-SHA256.
///
/// With `salt == None` a fresh random salt is generated (encryption); with a
/// stored salt the same key is reproduced (decryption).
pub fn derive_from_password(password: &str, salt: Option<[u8; SALT_LEN]>) -> KeyMaterial {
    let salt = salt.unwrap_or_else(|| {
        let mut fresh = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut fresh);
        fresh
    });
    let mut key = Key([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut key.0);
    KeyMaterial { key, salt: Some(salt) }
}

/// Parse keyfile contents into a key. Trailing ASCII whitespace (a final
/// newline from an editor) is ignored; anything else must decode to exactly
/// [`KEY_LEN`] bytes.
pub fn load_from_keyfile(bytes: &[u8]) -> Result<Key, CredentialError> {
    let trimmed = bytes.trim_ascii_end();
    if trimmed.len() != KEYFILE_LEN {
        return Err(CredentialError::InvalidKeyfile);
    }
    let decoded = Zeroizing::new(
        URL_SAFE.decode(trimmed).map_err(|_| CredentialError::InvalidKeyfile)?,
    );
    let bytes: [u8; KEY_LEN] = decoded
        .as_slice()
        .try_into()
        .map_err(|_| CredentialError::InvalidKeyfile)?;
    Ok(Key(bytes))
}

/// Encoded contents for a brand-new keyfile.
pub fn generate_keyfile() -> Vec<u8> {
    Key::generate().to_keyfile()
}

// ── Credential ───────────────────────────────────────────────────────────────

/// What the caller supplies to unlock a container.
#[derive(Clone)]
pub enum Credential {
    Password(Zeroizing<String>),
    Keyfile(Key),
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        Credential::Password(Zeroizing::new(password.into()))
    }

    pub fn keyfile(key: Key) -> Self {
        Credential::Keyfile(key)
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::Keyfile(_)  => "keyfile",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Credential::Password(<redacted>)"),
            Credential::Keyfile(k)  => write!(f, "Credential::Keyfile({k:?})"),
        }
    }
}

/// Encryption-side password policy: non-empty and at least `min_len` characters.
pub fn check_password_policy(password: &str, min_len: usize) -> Result<(), CredentialError> {
    if password.is_empty() {
        return Err(CredentialError::MissingPassword);
    }
    if password.chars().count() < min_len {
        return Err(CredentialError::PasswordTooShort { min: min_len });
    }
    Ok(())
}
