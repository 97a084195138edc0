//! Batch encryption and decryption over an ordered list of paths.
//!
//! Items are processed strictly in order on one worker. A failing item is
//! recorded in [`BatchOutcome::failed`] and the batch moves on; nothing an
//! individual item does can abort its siblings. Progress is reported before
//! each item and once more at the end with `current == total`.
//!
//! ```no_run
//! use flck::batch::BatchRunner;
//! use flck::key::Credential;
//! use std::path::PathBuf;
//!
//! let runner: BatchRunner = BatchRunner::default();
//! let runner = runner.with_progress(|ev: flck::batch::ProgressEvent| {
//!     println!("[{}/{}] {}", ev.current, ev.total, ev.message)
//! });
//! let items = vec![PathBuf::from("notes.txt"), PathBuf::from("photos")];
//! let outcome = runner.encrypt_all(&items, &Credential::password("correct horse"), false);
//! assert!(outcome.failed.is_empty());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::file_codec::{encrypted_path, unique_dir, FileCodec};
use crate::folder::{FolderArchiver, ZipArchiver};
use crate::fs_gateway::{FileSystem, OsFileSystem};
use crate::key::Credential;

/// Message recorded for items skipped after cancellation.
pub const CANCELLED: &str = "cancelled";

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub current: usize,
    pub total:   usize,
    pub message: String,
}

/// Receiver of progress events. Called on whichever thread runs the batch;
/// getting the event to a UI thread is the implementor's job.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<T: Fn(ProgressEvent) + Send + Sync> ProgressSink for T {
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Events go down a channel; a dropped receiver just stops delivery.
impl ProgressSink for Sender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

struct Silent;

impl ProgressSink for Silent {
    fn report(&self, _: ProgressEvent) {}
}

// ── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<PathBuf>,
    pub failed:    Vec<(PathBuf, String)>,
    /// Cleanup problems after an item already succeeded (deleting the
    /// source, removing a temp archive). They never turn a success into a
    /// failure.
    pub warnings:  Vec<(PathBuf, String)>,
}

impl BatchOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

// ── BatchRunner ──────────────────────────────────────────────────────────────

pub struct BatchRunner<F: FileSystem = OsFileSystem, A: FolderArchiver = ZipArchiver> {
    codec:    FileCodec<F>,
    archiver: A,
    progress: Box<dyn ProgressSink>,
    cancel:   Option<Arc<AtomicBool>>,
}

impl Default for BatchRunner<OsFileSystem, ZipArchiver> {
    fn default() -> Self {
        Self::new(FileCodec::default(), ZipArchiver)
    }
}

impl<F: FileSystem, A: FolderArchiver> BatchRunner<F, A> {
    pub fn new(codec: FileCodec<F>, archiver: A) -> Self {
        Self { codec, archiver, progress: Box::new(Silent), cancel: None }
    }

    pub fn with_progress<P: ProgressSink + 'static>(mut self, sink: P) -> Self {
        self.progress = Box::new(sink);
        self
    }

    /// Checked before each item; once set, the remaining items are recorded
    /// as failed with [`CANCELLED`]. An item already in flight completes.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn codec(&self) -> &FileCodec<F> {
        &self.codec
    }

    // ── Encrypt ──────────────────────────────────────────────────────────────

    /// Encrypt every item to `<item>.locked`. Folders are zipped first.
    pub fn encrypt_all(
        &self,
        items:            &[PathBuf],
        credential:       &Credential,
        delete_originals: bool,
    ) -> BatchOutcome {
        let total = items.len();
        let mut outcome = BatchOutcome::default();

        for (i, item) in items.iter().enumerate() {
            if self.is_cancelled() {
                outcome.failed.push((item.clone(), CANCELLED.to_owned()));
                continue;
            }
            self.report(i, total, format!("Encrypting {}...", display_name(item)));

            match self.encrypt_one(item, credential, &mut outcome.warnings) {
                Ok(output) => {
                    info!(item = %item.display(), output = %output.display(), "encrypted");
                    if delete_originals {
                        if let Err(e) = self.delete_source(item) {
                            warn!(item = %item.display(), error = %e, "could not delete original");
                            outcome.warnings.push((item.clone(), format!("could not delete original: {e}")));
                        }
                    }
                    outcome.succeeded.push(item.clone());
                }
                Err(e) => outcome.failed.push((item.clone(), e.to_string())),
            }
        }

        self.report(total, total, "Encryption complete!".to_owned());
        outcome
    }

    fn encrypt_one(
        &self,
        item:       &Path,
        credential: &Credential,
        warnings:   &mut Vec<(PathBuf, String)>,
    ) -> Result<PathBuf> {
        let output = encrypted_path(item)?;
        if !self.codec.fs().is_dir(item) {
            return self.codec.encrypt_file(item, &output, credential, false);
        }

        let packed = self.archiver.compress(item)?;
        let result = self.codec.encrypt_file(packed.path(), &output, credential, true);
        if let Err(e) = packed.close() {
            warnings.push((item.to_owned(), format!("could not remove temporary archive: {e}")));
        }
        result
    }

    // ── Decrypt ──────────────────────────────────────────────────────────────

    /// Decrypt every item next to itself. Packed folders are extracted into
    /// a sibling folder named after the archive.
    pub fn decrypt_all(
        &self,
        items:            &[PathBuf],
        credential:       &Credential,
        delete_encrypted: bool,
    ) -> BatchOutcome {
        let total = items.len();
        let mut outcome = BatchOutcome::default();

        for (i, item) in items.iter().enumerate() {
            if self.is_cancelled() {
                outcome.failed.push((item.clone(), CANCELLED.to_owned()));
                continue;
            }
            self.report(i, total, format!("Decrypting {}...", display_name(item)));

            match self.decrypt_one(item, credential, &mut outcome.warnings) {
                Ok(output) => {
                    info!(item = %item.display(), output = %output.display(), "decrypted");
                    if delete_encrypted {
                        if let Err(e) = self.codec.fs().remove_file(item) {
                            warn!(item = %item.display(), error = %e, "could not delete encrypted file");
                            outcome.warnings.push((item.clone(), format!("could not delete encrypted file: {e}")));
                        }
                    }
                    outcome.succeeded.push(item.clone());
                }
                Err(e) => outcome.failed.push((item.clone(), e.to_string())),
            }
        }

        self.report(total, total, "Decryption complete!".to_owned());
        outcome
    }

    fn decrypt_one(
        &self,
        item:       &Path,
        credential: &Credential,
        warnings:   &mut Vec<(PathBuf, String)>,
    ) -> Result<PathBuf> {
        let output_dir = parent_dir(item);
        let decrypted = self.codec.decrypt_file(item, output_dir, credential)?;
        if !decrypted.compressed {
            return Ok(decrypted.output_path);
        }

        let folder_name = Path::new(&decrypted.original_filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| decrypted.original_filename.clone());
        let extract_dir = unique_dir(
            self.codec.fs(),
            &output_dir.join(folder_name),
            self.codec.options().max_name_attempts,
        )?;
        if let Err(e) = self.archiver.extract(&decrypted.output_path, &extract_dir) {
            // Never leave the decrypted archive behind for a failed item.
            if let Err(rm) = self.codec.fs().remove_file(&decrypted.output_path) {
                warn!(archive = %decrypted.output_path.display(), error = %rm, "could not remove decrypted archive");
                warnings.push((item.to_owned(), format!("could not remove decrypted archive: {rm}")));
            }
            return Err(e.into());
        }

        if let Err(e) = self.codec.fs().remove_file(&decrypted.output_path) {
            warnings.push((item.to_owned(), format!("could not remove decrypted archive: {e}")));
        }
        Ok(extract_dir)
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn delete_source(&self, item: &Path) -> std::io::Result<()> {
        let fs = self.codec.fs();
        if fs.is_dir(item) { fs.remove_dir_all(item) } else { fs.remove_file(item) }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
    }

    fn report(&self, current: usize, total: usize, message: String) {
        self.progress.report(ProgressEvent { current, total, message });
    }
}

// ── Background execution ─────────────────────────────────────────────────────

impl<F, A> BatchRunner<F, A>
where
    F: FileSystem + 'static,
    A: FolderArchiver + 'static,
{
    /// Run [`encrypt_all`](Self::encrypt_all) on a worker thread. The caller
    /// hears back only through the progress sink and the join handle.
    pub fn spawn_encrypt_all(
        self,
        items:            Vec<PathBuf>,
        credential:       Credential,
        delete_originals: bool,
    ) -> JoinHandle<BatchOutcome> {
        thread::spawn(move || self.encrypt_all(&items, &credential, delete_originals))
    }

    /// Run [`decrypt_all`](Self::decrypt_all) on a worker thread.
    pub fn spawn_decrypt_all(
        self,
        items:            Vec<PathBuf>,
        credential:       Credential,
        delete_encrypted: bool,
    ) -> JoinHandle<BatchOutcome> {
        thread::spawn(move || self.decrypt_all(&items, &credential, delete_encrypted))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
