//! Folder packing: a folder is zipped before encryption and unzipped after
//! decryption. The archive entries are relative to the folder itself, so
//! extracting into `<dir>/<folder-name>` restores the original tree.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const ARCHIVE_EXTENSION: &str = "zip";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("not a folder: {}", .0.display())]
    NotAFolder(PathBuf),
    #[error("cannot pack {}: not a regular file or folder", .0.display())]
    UnsupportedEntry(PathBuf),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A packed folder living in its own temp directory.
///
/// The archive is named `<folder-name>.zip`, which is the name recorded in
/// the container and later used to name the extraction folder.
#[derive(Debug)]
pub struct CompressedFolder {
    dir:  TempDir,
    path: PathBuf,
}

impl CompressedFolder {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the temp directory, reporting failure instead of ignoring it.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

pub trait FolderArchiver: Send + Sync {
    fn compress(&self, folder: &Path) -> Result<CompressedFolder, ArchiveError>;
    /// Unpack `archive` into `dest`. On failure a `dest` created by this
    /// call is removed again.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError>;
}

/// Deflate-compressed ZIP archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl FolderArchiver for ZipArchiver {
    fn compress(&self, folder: &Path) -> Result<CompressedFolder, ArchiveError> {
        if !folder.is_dir() {
            return Err(ArchiveError::NotAFolder(folder.to_owned()));
        }
        let name = folder
            .file_name()
            .ok_or_else(|| ArchiveError::NotAFolder(folder.to_owned()))?
            .to_string_lossy()
            .into_owned();

        let dir = tempfile::Builder::new().prefix("flck_temp_").tempdir()?;
        let path = dir.path().join(format!("{name}.{ARCHIVE_EXTENSION}"));

        let mut zip = ZipWriter::new(File::create(&path)?);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated);

        // Links are packed as the content they point to; a loop is an error.
        for entry in WalkDir::new(folder).min_depth(1).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let rel = entry
                .path()
                .strip_prefix(folder)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let entry_name = zip_entry_name(rel);

            if entry.file_type().is_dir() {
                zip.add_directory(entry_name, options)?;
            } else if entry.file_type().is_file() {
                zip.start_file(entry_name, options)?;
                io::copy(&mut File::open(entry.path())?, &mut zip)?;
            } else {
                return Err(ArchiveError::UnsupportedEntry(entry.path().to_owned()));
            }
        }
        zip.finish()?;

        Ok(CompressedFolder { dir, path })
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
        let mut zip = ZipArchive::new(File::open(archive)?)?;
        let created = !dest.exists();
        fs::create_dir_all(dest)?;
        // `extract` refuses entries whose names would escape `dest`.
        if let Err(e) = zip.extract(dest) {
            if created {
                let _ = fs::remove_dir_all(dest);
            }
            return Err(e.into());
        }
        Ok(())
    }
}

/// ZIP entry names always use `/`, whatever the host separator is.
fn zip_entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
