use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::container::FormatError;
use crate::crypto::CryptoError;
use crate::folder::ArchiveError;
use crate::key::CredentialError;

/// Every way a single-item encrypt or decrypt can fail.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("folder archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("no free output name for {} after {attempts} attempts", path.display())]
    NameCollisionExhausted { path: PathBuf, attempts: u32 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Wrong key, wrong password, or tampered ciphertext.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Error::Crypto(CryptoError::AuthenticationFailed))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
