pub mod container;
pub mod key;
pub mod crypto;
pub mod fs_gateway;
pub mod folder;
pub mod file_codec;
pub mod batch;
pub mod error;

pub use container::{Container, Header, Mode, FormatError};
pub use key::{Credential, CredentialError, Key, KeyMaterial};
pub use crypto::CryptoError;
pub use file_codec::{CodecOptions, Decrypted, FileCodec};
pub use batch::{BatchOutcome, BatchRunner, ProgressEvent, ProgressSink};
pub use error::{Error, Result};
