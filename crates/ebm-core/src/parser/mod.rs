//! Format sniffing and metadata extraction.
//!
//! [`MetadataParser`] is the seam the collector depends on. [`FileParser`]
//! sniffs the content of a file and dispatches to the format readers in
//! [`formats`].

pub mod formats;
pub mod sniff;

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Book, BookFile, BookFormat};

pub use sniff::{detect_format, sniff_format};

/// Bibliographic metadata read from one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub isbn: String,
    pub title: String,
    pub authors: Vec<String>,
    pub publisher: String,
    pub tags: Vec<String>,
}

/// A parsed file: where it is, what it is, and what it says about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBook {
    pub file: BookFile,
    pub metadata: Metadata,
}

impl ParsedBook {
    /// A one-file book built from this file's metadata
    pub fn into_book(self) -> Book {
        let Metadata {
            isbn,
            title,
            authors,
            publisher,
            tags,
        } = self.metadata;
        let mut book = Book::new(isbn, title, authors, publisher, tags);
        book.append_file(self.file.path, self.file.format);
        book
    }
}

/// Turns a path into a [`ParsedBook`].
///
/// Implementations return [`Error::UnsupportedFormat`] for files that are
/// not e-books; any other error is treated as fatal by the collector.
pub trait MetadataParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<ParsedBook>;
}

impl<F> MetadataParser for F
where
    F: Fn(&Path) -> Result<ParsedBook> + Send + Sync,
{
    fn parse(&self, path: &Path) -> Result<ParsedBook> {
        self(path)
    }
}

/// Default parser: content sniffing plus the PDF/EPUB/MOBI readers
#[derive(Debug, Clone, Copy, Default)]
pub struct FileParser;

impl MetadataParser for FileParser {
    fn parse(&self, path: &Path) -> Result<ParsedBook> {
        parse(path)
    }
}

/// Sniff and parse a single file
pub fn parse(path: &Path) -> Result<ParsedBook> {
    let format =
        sniff_format(path)?.ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;

    let mut metadata = match format {
        BookFormat::Pdf => formats::pdf::read_metadata(path)?,
        BookFormat::Epub => formats::epub::read_metadata(path)?,
        BookFormat::Mobi => formats::mobi::read_metadata(path)?,
    };

    metadata.title = metadata.title.trim().to_string();
    if metadata.title.is_empty() {
        metadata.title = title_from_path(path);
    }

    Ok(ParsedBook {
        file: BookFile::new(path, format),
        metadata,
    })
}

/// File name without its extension
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
