//! The managed library: files on disk under a normalized layout plus the
//! catalog that describes them.
//!
//! Imports stage files into `<root>/<authors>/<title>/` and commit the
//! catalog rows in one transaction; if either step fails every staged file
//! is deleted again. Removal moves files into a quarantine directory first
//! and only deletes them once the catalog delete has committed.

use chrono::Utc;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::cancel::CancellationToken;
use crate::config::{Config, CATALOG_FILE_NAME};
use crate::error::{Error, Result};
use crate::logging::{log_file_error, log_fs_modification};
use crate::persistence::CatalogStore;
use crate::safety::{
    copy_new, move_file, prune_empty_dirs, rebase, remove_quietly, sanitize_component, CopyOutcome,
};
use crate::types::{Book, BookFile, CatalogBook};

/// Result of a best-effort export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Files written to the destination
    pub copied: Vec<PathBuf>,
    pub failed: Vec<ExportFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub path: PathBuf,
    pub error: String,
}

pub struct LibraryManager {
    root: PathBuf,
    quarantine: PathBuf,
    workers: usize,
    store: CatalogStore,
}

impl LibraryManager {
    /// Open the library described by `config`, creating its root and catalog.
    ///
    /// The root is canonicalized so catalogued paths stay valid from any
    /// working directory.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let root = config.library_root()?;
        fs::create_dir_all(&root)?;
        let root = fs::canonicalize(&root)?;
        let store = CatalogStore::open(&root.join(CATALOG_FILE_NAME))?;
        Ok(Self::with_store(
            root,
            config.quarantine_root()?,
            config.workers,
            store,
        ))
    }

    /// Relative `root` and `quarantine` are resolved against the current
    /// working directory
    pub fn with_store(
        root: impl Into<PathBuf>,
        quarantine: impl Into<PathBuf>,
        workers: usize,
        store: CatalogStore,
    ) -> Self {
        Self {
            root: absolute(root.into()),
            quarantine: absolute(quarantine.into()),
            workers: workers.max(1),
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// `<root>/<authors>/<title>` for a book
    pub fn destination_dir(&self, book: &Book) -> PathBuf {
        destination_dir(&self.root, book)
    }

    /// Copy the books' files into the library and catalogue them.
    ///
    /// Files whose destination already exists are skipped; books left
    /// without files are not catalogued. On any failure, including
    /// cancellation, every file written by this call is removed.
    pub fn import_books(
        &mut self,
        books: Vec<Book>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CatalogBook>> {
        cancel.check()?;
        if books.is_empty() {
            return Ok(Vec::new());
        }

        let root = &self.root;
        let dirs: Vec<PathBuf> = books.iter().map(|b| destination_dir(root, b)).collect();
        let written = Mutex::new(Vec::<PathBuf>::new());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;

        info!("Importing {} books into {}", books.len(), root.display());

        let catalogued = self.store.create_books(
            || {
                let staged = pool.install(|| {
                    books
                        .par_iter()
                        .map(|book| {
                            cancel.check()?;
                            stage_book(root, book, &written)
                        })
                        .collect::<Result<Vec<_>>>()
                })?;
                cancel.check()?;
                Ok(staged.into_iter().flatten().collect())
            },
            || undo_staging(&written, &dirs, root),
        )?;

        info!(
            "Imported {} books ({} files copied)",
            catalogued.len(),
            written.into_inner().unwrap_or_else(PoisonError::into_inner).len()
        );
        Ok(catalogued)
    }

    pub fn find_books(&self, pattern: &str) -> Result<Vec<CatalogBook>> {
        self.store.find_books(pattern)
    }

    pub fn get_books(&self, ids: &[i64]) -> Result<Vec<CatalogBook>> {
        self.store.get_books_by_ids(ids)
    }

    /// Remove books from the catalog and delete their files.
    ///
    /// Files are moved to a quarantine directory that mirrors the library
    /// layout; they are restored if the catalog delete fails and deleted
    /// only after it commits.
    pub fn remove_books(&mut self, ids: &[i64]) -> Result<Vec<CatalogBook>> {
        let root = &self.root;
        let session = self.quarantine.join(format!(
            "remove-{}-{}",
            std::process::id(),
            Utc::now().format("%Y%m%dT%H%M%S%.f")
        ));
        let moved = RefCell::new(Vec::<(PathBuf, PathBuf)>::new());

        let result = self.store.remove_books(
            ids,
            |books| {
                for file in books.iter().flat_map(|b| &b.files) {
                    let target = rebase(&file.path, root, &session);
                    match move_file(&file.path, &target) {
                        Ok(()) => moved.borrow_mut().push((file.path.clone(), target)),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            warn!("{} is already gone", file.path.display());
                        }
                        Err(e) => {
                            log_file_error(&file.path, "quarantine", &e);
                            return Err(e.into());
                        }
                    }
                }
                Ok(())
            },
            || {
                for (original, quarantined) in moved.borrow().iter().rev() {
                    match move_file(quarantined, original) {
                        Ok(()) => log_fs_modification("restore", original, None),
                        Err(e) => {
                            log_file_error(original, "restore", &e);
                            error!(
                                "Could not restore {}; it remains at {}",
                                original.display(),
                                quarantined.display()
                            );
                        }
                    }
                }
            },
        );

        let moved = moved.into_inner();
        match &result {
            Ok(_) => {
                for (original, quarantined) in &moved {
                    remove_quietly(quarantined);
                    prune_parent(original, root);
                    prune_parent(quarantined, &self.quarantine);
                }
            }
            Err(e) => {
                warn!("Removal rolled back: {}", e);
                for (_, quarantined) in &moved {
                    prune_parent(quarantined, &self.quarantine);
                }
            }
        }

        result
    }

    /// Copy the files of the given books into `dest`, keeping file names.
    ///
    /// A failed copy is logged and recorded in the summary; the remaining
    /// files are still exported.
    pub fn export_books(&self, ids: &[i64], dest: &Path) -> Result<ExportSummary> {
        let books = self.store.get_books_by_ids(ids)?;
        fs::create_dir_all(dest)?;

        let mut summary = ExportSummary::default();
        for file in books.iter().flat_map(|b| &b.files) {
            match export_file(file, dest) {
                Ok(target) => summary.copied.push(target),
                Err(e) => {
                    log_file_error(&file.path, "export", &e);
                    summary.failed.push(ExportFailure {
                        path: file.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Exported {} files to {} ({} failed)",
            summary.copied.len(),
            dest.display(),
            summary.failed.len()
        );
        Ok(summary)
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

fn destination_dir(root: &Path, book: &Book) -> PathBuf {
    root.join(sanitize_component(&book.joined_authors()))
        .join(sanitize_component(&book.title))
}

/// `<title> - <authors><ext>`, keeping the source extension when it has one
fn destination_name(book: &Book, file: &BookFile) -> String {
    let extension = file
        .path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.format.extension().to_string());
    format!(
        "{} - {}.{}",
        sanitize_component(&book.title),
        sanitize_component(&book.joined_authors()),
        extension
    )
}

/// Copy one book's files into its destination directory.
///
/// Every created file is recorded in `written` before any bytes are copied.
fn stage_book(root: &Path, book: &Book, written: &Mutex<Vec<PathBuf>>) -> Result<Option<Book>> {
    let dir = destination_dir(root, book);
    fs::create_dir_all(&dir)?;

    let mut staged = book.without_files();
    for file in book.files() {
        let target = dir.join(destination_name(book, file));
        let outcome = copy_new(&file.path, &target, |created| {
            written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(created.to_path_buf());
        })
        .map_err(|e| {
            log_file_error(&file.path, "stage", &e);
            e
        })?;

        match outcome {
            CopyOutcome::Copied => {
                staged.append_file(target, file.format);
            }
            CopyOutcome::AlreadyExists => {
                debug!("{} is already in the library", target.display());
            }
        }
    }

    Ok((!staged.files().is_empty()).then_some(staged))
}

fn undo_staging(written: &Mutex<Vec<PathBuf>>, dirs: &[PathBuf], root: &Path) {
    let written = written.lock().unwrap_or_else(PoisonError::into_inner);
    warn!("Rolling back import: removing {} staged files", written.len());
    for path in written.iter() {
        if !remove_quietly(path) {
            error!("Staged file {} could not be removed", path.display());
        }
    }
    for dir in dirs {
        prune_empty_dirs(dir, root);
    }
}

fn export_file(file: &BookFile, dest: &Path) -> io::Result<PathBuf> {
    let name = file.path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "catalogued path has no file name")
    })?;
    let target = dest.join(name);
    fs::copy(&file.path, &target)?;
    log_fs_modification("export", &target, Some(&format!("from {}", file.path.display())));
    Ok(target)
}

fn prune_parent(path: &Path, root: &Path) {
    if let Some(parent) = path.parent() {
        prune_empty_dirs(parent, root);
    }
}
