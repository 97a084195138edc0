//! Single-file encrypt / decrypt.
//!
//! Each call walks `Reading → KeyResolved → Encrypting|Decrypting → Writing
//! → Done`. The first failure stops the item and is returned as an
//! [`Error`]; the stage it happened in is logged. Key material lives only
//! for the duration of one call.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::container::{self, Container, FormatError, Mode};
use crate::crypto;
use crate::error::{Error, Result};
use crate::fs_gateway::{FileSystem, OsFileSystem};
use crate::key::{self, Credential, CredentialError, KeyMaterial, MIN_PASSWORD_LENGTH};

/// Extension appended to encrypted outputs.
pub const ENCRYPTED_EXTENSION: &str = "locked";
/// Upper bound on the `_N` suffix search for a free output name.
pub const DEFAULT_MAX_NAME_ATTEMPTS: u32 = 10_000;

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Minimum password length for encryption. Decryption only requires a
    /// non-empty password.
    pub min_password_len:  usize,
    pub max_name_attempts: u32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            min_password_len:  MIN_PASSWORD_LENGTH,
            max_name_attempts: DEFAULT_MAX_NAME_ATTEMPTS,
        }
    }
}

// ── Stage ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Reading,
    KeyResolved,
    Encrypting,
    Decrypting,
    Writing,
    Done,
}

/// Result of a successful decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub output_path:       PathBuf,
    /// The plaintext is a packed folder that the caller should extract.
    pub compressed:        bool,
    pub original_filename: String,
}

// ── FileCodec ────────────────────────────────────────────────────────────────

pub struct FileCodec<F: FileSystem = OsFileSystem> {
    fs:      F,
    options: CodecOptions,
}

impl Default for FileCodec<OsFileSystem> {
    fn default() -> Self {
        Self::new(OsFileSystem, CodecOptions::default())
    }
}

impl<F: FileSystem> FileCodec<F> {
    pub fn new(fs: F, options: CodecOptions) -> Self {
        Self { fs, options }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Encrypt `input` into a container at `output`.
    ///
    /// If `output` is taken, a `_N` suffix is added before the extension.
    /// Returns the path actually written.
    pub fn encrypt_file(
        &self,
        input:      &Path,
        output:     &Path,
        credential: &Credential,
        compressed: bool,
    ) -> Result<PathBuf> {
        let mut stage = Stage::Idle;
        let result = self.encrypt_stages(input, output, credential, compressed, &mut stage);
        if let Err(ref e) = result {
            warn!(input = %input.display(), ?stage, error = %e, "encryption failed");
        }
        result
    }

    fn encrypt_stages(
        &self,
        input:      &Path,
        output:     &Path,
        credential: &Credential,
        compressed: bool,
        stage:      &mut Stage,
    ) -> Result<PathBuf> {
        *stage = Stage::Reading;
        let plaintext = Zeroizing::new(self.fs.read_all(input)?);
        let original_filename = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(FormatError::InvalidFilename)?
            .to_owned();
        trace!(bytes = plaintext.len(), name = %original_filename, "read source");

        *stage = Stage::KeyResolved;
        let material = match credential {
            Credential::Password(password) => {
                key::check_password_policy(password, self.options.min_password_len)?;
                key::derive_from_password(password, None)
            }
            Credential::Keyfile(k) => KeyMaterial::from_key(k.clone()),
        };

        *stage = Stage::Encrypting;
        let sealed = crypto::seal(&material.key, &plaintext)?;
        let bytes = container::encode(material.mode(), compressed, &original_filename, &sealed)?;
        drop(material);

        *stage = Stage::Writing;
        let output = self.write_unique(output, &bytes)?;

        *stage = Stage::Done;
        debug!(
            input = %input.display(),
            output = %output.display(),
            mode = credential.mode_name(),
            compressed,
            "encrypted file"
        );
        Ok(output)
    }

    /// Decrypt the container at `input` into `output_dir`, under the
    /// filename stored in the container.
    ///
    /// The header is validated before any key derivation. An existing file
    /// of the same name is never overwritten; a `_N` suffix is added.
    pub fn decrypt_file(
        &self,
        input:      &Path,
        output_dir: &Path,
        credential: &Credential,
    ) -> Result<Decrypted> {
        let mut stage = Stage::Idle;
        let result = self.decrypt_stages(input, output_dir, credential, &mut stage);
        if let Err(ref e) = result {
            warn!(input = %input.display(), ?stage, error = %e, "decryption failed");
        }
        result
    }

    fn decrypt_stages(
        &self,
        input:      &Path,
        output_dir: &Path,
        credential: &Credential,
        stage:      &mut Stage,
    ) -> Result<Decrypted> {
        *stage = Stage::Reading;
        let bytes = self.fs.read_all(input)?;
        let Container { header, ciphertext } = Container::decode(&bytes)?;
        check_stored_filename(&header.original_filename)?;
        trace!(mode = header.mode.name(), name = %header.original_filename, "parsed header");

        *stage = Stage::KeyResolved;
        let key = match (header.mode, credential) {
            (Mode::Password { salt }, Credential::Password(password)) => {
                if password.is_empty() {
                    return Err(CredentialError::MissingPassword.into());
                }
                key::derive_from_password(password, Some(salt)).key
            }
            (Mode::Password { .. }, Credential::Keyfile(_)) => {
                return Err(CredentialError::MissingPassword.into());
            }
            (Mode::Keyfile, Credential::Keyfile(k)) => k.clone(),
            (Mode::Keyfile, Credential::Password(_)) => {
                return Err(CredentialError::MissingKey.into());
            }
        };

        *stage = Stage::Decrypting;
        let plaintext = Zeroizing::new(crypto::open(&key, &ciphertext)?);
        drop(key);

        *stage = Stage::Writing;
        let output_path = self.write_unique(&output_dir.join(&header.original_filename), &plaintext)?;

        *stage = Stage::Done;
        debug!(
            input = %input.display(),
            output = %output_path.display(),
            compressed = header.compressed,
            "decrypted file"
        );
        Ok(Decrypted {
            output_path,
            compressed:        header.compressed,
            original_filename: header.original_filename,
        })
    }
}

impl<F: FileSystem> FileCodec<F> {
    /// Write `data` under the first free variant of `path`. A name that is
    /// taken between the lookup and the write moves on to the next suffix.
    fn write_unique(&self, path: &Path, data: &[u8]) -> Result<PathBuf> {
        let max = self.options.max_name_attempts;
        for _ in 0..=max {
            let candidate = unique_path(&self.fs, path, max)?;
            match self.fs.write_atomic(&candidate, data) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %candidate.display(), "output name taken during write, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::NameCollisionExhausted { path: path.to_owned(), attempts: max })
    }
}

/// The stored name must be a bare file name: nothing that could climb out
/// of or redirect into another directory.
fn check_stored_filename(name: &str) -> std::result::Result<(), FormatError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad { Err(FormatError::InvalidFilename) } else { Ok(()) }
}

// ── Output naming ────────────────────────────────────────────────────────────

/// `path` itself if free, else `stem_1.ext`, `stem_2.ext`, … up to
/// `max_attempts`.
pub fn unique_path<F: FileSystem + ?Sized>(fs: &F, path: &Path, max_attempts: u32) -> Result<PathBuf> {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext  = path.extension().map(|e| e.to_string_lossy().into_owned());
    next_free(fs, path, max_attempts, |n| match &ext {
        Some(ext) => format!("{stem}_{n}.{ext}"),
        None      => format!("{stem}_{n}"),
    })
}

/// Like [`unique_path`] but the suffix goes after the whole name, for
/// directories: `name_1`, `name_2`, …
pub fn unique_dir<F: FileSystem + ?Sized>(fs: &F, path: &Path, max_attempts: u32) -> Result<PathBuf> {
    let name = path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    next_free(fs, path, max_attempts, |n| format!("{name}_{n}"))
}

fn next_free<F, N>(fs: &F, path: &Path, max_attempts: u32, name_for: N) -> Result<PathBuf>
where
    F: FileSystem + ?Sized,
    N: Fn(u32) -> String,
{
    if !fs.exists(path) {
        return Ok(path.to_owned());
    }
    for n in 1..=max_attempts {
        let candidate = path.with_file_name(name_for(n));
        if !fs.exists(&candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::NameCollisionExhausted { path: path.to_owned(), attempts: max_attempts })
}

/// `<input>.locked`, e.g. `notes.txt` → `notes.txt.locked`, `photos/` → `photos.locked`.
pub fn encrypted_path(input: &Path) -> Result<PathBuf> {
    let name = input.file_name().ok_or(FormatError::InvalidFilename)?;
    let mut name = name.to_os_string();
    name.push(".");
    name.push(ENCRYPTED_EXTENSION);
    Ok(input.with_file_name(name))
}
