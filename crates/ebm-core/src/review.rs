//! Human review of a collected batch before it is imported.

use log::{debug, info};
use std::fs;
use std::io::Write;
use std::process::Command;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::Book;

/// A pass over the collected books that may edit their metadata
pub trait Reviewer {
    fn review(&self, books: Vec<Book>) -> Result<Vec<Book>>;
}

/// Accepts the batch as collected
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReview;

impl Reviewer for NoReview {
    fn review(&self, books: Vec<Book>) -> Result<Vec<Book>> {
        Ok(books)
    }
}

/// Opens the batch as JSON in an external editor and reads it back
#[derive(Debug, Clone)]
pub struct EditorReviewer {
    editor: String,
}

impl EditorReviewer {
    /// `editor` may carry arguments, e.g. `code --wait`
    pub fn new(editor: impl Into<String>) -> Self {
        Self {
            editor: editor.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.editor_command())
    }
}

impl Reviewer for EditorReviewer {
    fn review(&self, books: Vec<Book>) -> Result<Vec<Book>> {
        if books.is_empty() {
            return Ok(books);
        }

        let mut scratch = tempfile::Builder::new()
            .prefix("ebm-review-")
            .suffix(".json")
            .tempfile()?;
        serde_json::to_writer_pretty(scratch.as_file_mut(), &books)?;
        scratch.as_file_mut().flush()?;

        let mut words = self.editor.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| Error::Review("no editor configured".to_string()))?;

        info!("Opening {} books in {}", books.len(), program);
        let status = Command::new(program)
            .args(words)
            .arg(scratch.path())
            .status()
            .map_err(|e| Error::Review(format!("cannot start editor '{}': {}", program, e)))?;

        if !status.success() {
            return Err(Error::Review(format!("editor exited with {}", status)));
        }

        // Editors may replace the file instead of writing in place
        let edited = fs::read_to_string(scratch.path())?;
        let books: Vec<Book> = serde_json::from_str(&edited)?;
        debug!("Review returned {} books", books.len());
        Ok(books)
    }
}
