//! On-disk container layout for FLCK encrypted files.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "FLCK"
//! 4       1     version (1)
//! 5       1     mode (0 = password, 1 = keyfile)
//! 6       32    salt (zero-filled for keyfile mode)
//! 38      1     compressed flag (0 / 1)
//! 39      2     filename length, big-endian
//! 41      n     original filename, UTF-8
//! 41+n    ..    ciphertext (nonce | body | tag), opaque here
//! ```
//!
//! Magic and version are checked before anything else is trusted, and every
//! length-prefixed read is bounds-checked, so garbage input is rejected
//! without touching the key derivation or the cipher.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"FLCK";
pub const VERSION: u8 = 1;
pub const SALT_LEN: usize = 32;

pub const MODE_PASSWORD: u8 = 0;
pub const MODE_KEYFILE: u8 = 1;

/// Size of every header field that precedes the filename bytes.
pub const FIXED_HEADER_LEN: usize = 4 + 1 + 1 + SALT_LEN + 1 + 2;
/// Longest filename the 16-bit length field can describe.
pub const MAX_FILENAME_LEN: usize = u16::MAX as usize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("not an encrypted container (bad magic)")]
    BadMagic,
    #[error("unsupported container version: {0}")]
    UnsupportedVersion(u8),
    #[error("unknown key mode byte: {0}")]
    InvalidMode(u8),
    #[error("invalid compressed flag byte: {0}")]
    InvalidFlag(u8),
    #[error("container is truncated")]
    Truncated,
    #[error("stored filename is not a usable file name")]
    InvalidFilename,
    #[error("filename is {0} bytes; the container limit is {MAX_FILENAME_LEN}")]
    FilenameTooLong(usize),
}

// ── Mode ─────────────────────────────────────────────────────────────────────

/// How the container key was originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Key = PBKDF2(password, salt); the salt travels in the header.
    Password { salt: [u8; SALT_LEN] },
    /// Key is an external keyfile; the header records nothing about it.
    Keyfile,
}

impl Mode {
    pub fn as_byte(&self) -> u8 {
        match self {
            Mode::Password { .. } => MODE_PASSWORD,
            Mode::Keyfile         => MODE_KEYFILE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Password { .. } => "password",
            Mode::Keyfile         => "keyfile",
        }
    }

    /// The salt as written to disk.
    fn salt_bytes(&self) -> [u8; SALT_LEN] {
        match self {
            Mode::Password { salt } => *salt,
            Mode::Keyfile           => [0u8; SALT_LEN],
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Everything in a container except the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub mode:              Mode,
    pub compressed:        bool,
    pub original_filename: String,
}

impl Header {
    pub fn new(mode: Mode, compressed: bool, original_filename: impl Into<String>) -> Self {
        Self { mode, compressed, original_filename: original_filename.into() }
    }

    /// Encoded byte length of this header.
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN + self.original_filename.len()
    }

    /// Serialise the header.
    ///
    /// A filename longer than [`MAX_FILENAME_LEN`] bytes is rejected with
    /// [`FormatError::FilenameTooLong`], never truncated.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let name = self.original_filename.as_bytes();
        if name.len() > MAX_FILENAME_LEN {
            return Err(FormatError::FilenameTooLong(name.len()));
        }
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.push(self.mode.as_byte());
        out.extend_from_slice(&self.mode.salt_bytes());
        out.push(self.compressed as u8);
        out.extend_from_slice(&(name.len() as u16).to_be_bytes());
        out.extend_from_slice(name);
        Ok(out)
    }

    /// Parse a header from the front of `reader`.
    ///
    /// Any short read is reported as [`FormatError::Truncated`].
    pub fn read<R: Read>(mut reader: R) -> Result<Self, FormatError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(truncated)?;
        if &magic != MAGIC {
            return Err(FormatError::BadMagic);
        }
        let version = reader.read_u8().map_err(truncated)?;
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let mode_byte = reader.read_u8().map_err(truncated)?;
        let mut salt = [0u8; SALT_LEN];
        reader.read_exact(&mut salt).map_err(truncated)?;
        let mode = match mode_byte {
            MODE_PASSWORD => Mode::Password { salt },
            MODE_KEYFILE  => Mode::Keyfile,
            other         => return Err(FormatError::InvalidMode(other)),
        };

        let compressed = match reader.read_u8().map_err(truncated)? {
            0 => false,
            1 => true,
            other => return Err(FormatError::InvalidFlag(other)),
        };

        let name_len = reader.read_u16::<BigEndian>().map_err(truncated)? as usize;
        let mut name = vec![0u8; name_len];
        reader.read_exact(&mut name).map_err(truncated)?;
        let original_filename = String::from_utf8(name)
            .map_err(|_| FormatError::InvalidFilename)?;

        Ok(Self { mode, compressed, original_filename })
    }

    /// Parse only the header of an encoded container.
    pub fn peek(bytes: &[u8]) -> Result<Self, FormatError> {
        Self::read(bytes)
    }
}

fn truncated(_: io::Error) -> FormatError {
    FormatError::Truncated
}

// ── Container ────────────────────────────────────────────────────────────────

/// A decoded container: header plus the opaque, self-authenticating ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub header:     Header,
    pub ciphertext: Vec<u8>,
}

impl Container {
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut cursor = bytes;
        let header = Header::read(&mut cursor)?;
        Ok(Self { header, ciphertext: cursor.to_vec() })
    }

    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        encode(self.header.mode, self.header.compressed, &self.header.original_filename, &self.ciphertext)
    }
}

/// Build a container: header followed by `ciphertext`.
pub fn encode(
    mode:              Mode,
    compressed:        bool,
    original_filename: &str,
    ciphertext:        &[u8],
) -> Result<Vec<u8>, FormatError> {
    let mut out = Header::new(mode, compressed, original_filename).to_bytes()?;
    out.extend_from_slice(ciphertext);
    Ok(out)
}
