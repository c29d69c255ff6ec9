use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Supported e-book formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Pdf,
    Epub,
    Mobi,
}

impl BookFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Epub => "epub",
            Self::Mobi => "mobi",
        }
    }

    /// Extension (without the dot) used when a source file has none
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "epub" => Ok(Self::Epub),
            "mobi" => Ok(Self::Mobi),
            other => Err(format!("unknown book format '{}'", other)),
        }
    }
}

/// One physical file of a book. Identity is the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFile {
    pub path: PathBuf,
    pub format: BookFormat,
}

impl BookFile {
    pub fn new(path: impl Into<PathBuf>, format: BookFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

/// A logical book before it is catalogued.
///
/// `authors`, `tags` and `files` are append-only and never hold duplicates;
/// membership is checked against the auxiliary sets on every append.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "BookRecord", into = "BookRecord")]
pub struct Book {
    pub isbn: String,
    pub title: String,
    pub publisher: String,
    authors: Vec<String>,
    tags: Vec<String>,
    files: Vec<BookFile>,
    seen_authors: HashSet<String>,
    seen_tags: HashSet<String>,
    seen_files: HashSet<PathBuf>,
}

impl Book {
    pub fn new(
        isbn: impl Into<String>,
        title: impl Into<String>,
        authors: impl IntoIterator<Item = String>,
        publisher: impl Into<String>,
        tags: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut book = Self {
            isbn: isbn.into(),
            title: title.into(),
            publisher: publisher.into(),
            ..Default::default()
        };
        for author in authors {
            book.append_author(author);
        }
        for tag in tags {
            book.append_tag(tag);
        }
        book
    }

    /// Same metadata, no files.
    pub fn without_files(&self) -> Self {
        Self::new(
            self.isbn.clone(),
            self.title.clone(),
            self.authors.iter().cloned(),
            self.publisher.clone(),
            self.tags.iter().cloned(),
        )
    }

    /// Returns true if the author was not already present
    pub fn append_author(&mut self, author: impl Into<String>) -> bool {
        let author = author.into();
        if self.seen_authors.contains(&author) {
            return false;
        }
        self.seen_authors.insert(author.clone());
        self.authors.push(author);
        true
    }

    /// Returns true if the tag was not already present
    pub fn append_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.seen_tags.contains(&tag) {
            return false;
        }
        self.seen_tags.insert(tag.clone());
        self.tags.push(tag);
        true
    }

    /// Returns true if no file with this path was already present
    pub fn append_file(&mut self, path: impl Into<PathBuf>, format: BookFormat) -> bool {
        let path = path.into();
        if self.seen_files.contains(&path) {
            return false;
        }
        self.seen_files.insert(path.clone());
        self.files.push(BookFile { path, format });
        true
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn files(&self) -> &[BookFile] {
        &self.files
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.seen_files.contains(path)
    }

    /// Authors joined with `,`, or `Unknown` when there are none
    pub fn joined_authors(&self) -> String {
        joined_authors(&self.authors)
    }
}

impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        self.isbn == other.isbn
            && self.title == other.title
            && self.publisher == other.publisher
            && self.authors == other.authors
            && self.tags == other.tags
            && self.files == other.files
    }
}

impl Eq for Book {}

pub(crate) fn joined_authors(authors: &[String]) -> String {
    if authors.is_empty() {
        "Unknown".to_string()
    } else {
        authors.join(",")
    }
}

/// Serialized shape of a [`Book`], as shown to the reviewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct BookRecord {
    isbn: String,
    title: String,
    authors: Vec<String>,
    publisher: String,
    tags: Vec<String>,
    files: Vec<BookFile>,
}

impl From<BookRecord> for Book {
    fn from(record: BookRecord) -> Self {
        let mut book = Book::new(
            record.isbn,
            record.title,
            record.authors,
            record.publisher,
            record.tags,
        );
        for file in record.files {
            book.append_file(file.path, file.format);
        }
        book
    }
}

impl From<Book> for BookRecord {
    fn from(book: Book) -> Self {
        Self {
            isbn: book.isbn,
            title: book.title,
            authors: book.authors,
            publisher: book.publisher,
            tags: book.tags,
            files: book.files,
        }
    }
}

/// A catalogued book with its store-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogBook {
    /// ID in the database
    pub id: i64,
    pub isbn: String,
    pub title: String,
    pub publisher: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub files: Vec<BookFile>,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// RFC 3339 modification timestamp
    pub modified_at: String,
}

impl CatalogBook {
    pub fn joined_authors(&self) -> String {
        joined_authors(&self.authors)
    }

    /// Distinct formats of this book's files, in file order
    pub fn formats(&self) -> Vec<BookFormat> {
        let mut formats = Vec::new();
        for file in &self.files {
            if !formats.contains(&file.format) {
                formats.push(file.format);
            }
        }
        formats
    }
}
