//! Core functionality for cataloguing e-books into a managed library.
//!
//! This library provides the building blocks of the `ebm` tool:
//! - Concurrent discovery of PDF, EPUB and MOBI files, merged into books by title
//! - Metadata extraction for each supported format
//! - A SQLite catalog with full-text search
//! - Atomic import, reversible removal and best-effort export of library files

// -- External Dependencies --
use log::info;
use std::path::Path;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use cancel::CancellationToken;
pub use config::*;
pub use discovery::Collector;
pub use error::{Error, Result};
pub use library::{ExportFailure, ExportSummary, LibraryManager};
pub use persistence::CatalogStore;
pub use review::{EditorReviewer, NoReview, Reviewer};
pub use types::*;

// -- Public Modules --
pub mod cancel;
pub mod config;
pub mod discovery;
pub mod library;
pub mod logging;
pub mod parser;
pub mod persistence;
pub mod review;
pub mod safety;
pub mod types;

// -- Test Modules --
#[cfg(test)]
pub mod test_utils;

/// Main entry point: collect, review and import in one pipeline
pub struct Ebm {
    config: Config,
    library: LibraryManager,
    cancel: CancellationToken,
}

impl Ebm {
    /// Open the library described by `config`
    pub fn new(config: Config) -> Result<Self> {
        let library = LibraryManager::open(&config)?;
        Ok(Self {
            config,
            library,
            cancel: CancellationToken::new(),
        })
    }

    /// Share a cancellation token, e.g. with a signal handler
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn library(&self) -> &LibraryManager {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut LibraryManager {
        &mut self.library
    }

    /// Discover the books under `path` without importing them
    pub fn collect(&self, path: &Path, recursive: bool) -> Result<Vec<Book>> {
        Collector::from_config(&self.config)
            .recursive(recursive)
            .with_cancellation(self.cancel.clone())
            .collect(path)
    }

    /// Run the full import pipeline for `path`
    pub fn import(
        &mut self,
        path: &Path,
        recursive: bool,
        reviewer: &dyn Reviewer,
    ) -> Result<Vec<CatalogBook>> {
        info!("Discovering books in {}...", path.display());
        let books = self.collect(path, recursive)?;
        info!("Found {} books", books.len());

        let books = reviewer.review(books)?;
        self.cancel.check()?;

        self.library.import_books(books, &self.cancel)
    }
}
