//! Filesystem access used by the file codec and the batch runner.
//!
//! Writes are all-or-nothing: data goes to a temp file in the destination
//! directory, is synced, and is then renamed into place. The rename refuses
//! to replace an existing file.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Prefix of the short-lived temp files created next to each output.
pub const TEMP_FILE_PREFIX: &str = ".flck-tmp-";

pub trait FileSystem: Send + Sync {
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>>;
    /// Write `data` to `path` so that a crash leaves either nothing or the
    /// complete file. Fails with `AlreadyExists` instead of overwriting.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = Builder::new().prefix(TEMP_FILE_PREFIX).tempfile_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        // Dangling symlinks still occupy the name.
        fs::symlink_metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}
