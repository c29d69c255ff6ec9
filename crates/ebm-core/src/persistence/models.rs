use log::warn;
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::Row;
use std::path::PathBuf;

use crate::types::{BookFile, BookFormat, CatalogBook};

impl ToSql for BookFormat {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// One row of the flat books/files/authors/tags join
#[derive(Debug, Clone)]
pub(crate) struct BookRow {
    pub id: i64,
    pub title: String,
    pub isbn: String,
    pub publisher: String,
    pub created_at: String,
    pub modified_at: String,
    pub file_path: Option<String>,
    pub file_type: Option<String>,
    pub author: Option<String>,
    pub tag: Option<String>,
}

impl BookRow {
    /// Column order of [`super::query::SELECT_BOOKS`]
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            isbn: row.get(2)?,
            publisher: row.get(3)?,
            created_at: row.get(4)?,
            modified_at: row.get(5)?,
            file_path: row.get(6)?,
            file_type: row.get(7)?,
            author: row.get(8)?,
            tag: row.get(9)?,
        })
    }

    fn into_book(self) -> CatalogBook {
        let mut book = CatalogBook {
            id: self.id,
            isbn: self.isbn.clone(),
            title: self.title.clone(),
            publisher: self.publisher.clone(),
            authors: Vec::new(),
            tags: Vec::new(),
            files: Vec::new(),
            created_at: self.created_at.clone(),
            modified_at: self.modified_at.clone(),
        };
        self.fold_into(&mut book);
        book
    }

    /// Add this row's author, tag and file to `book` unless already present
    fn fold_into(self, book: &mut CatalogBook) {
        if let Some(author) = self.author {
            if !book.authors.contains(&author) {
                book.authors.push(author);
            }
        }
        if let Some(tag) = self.tag {
            if !book.tags.contains(&tag) {
                book.tags.push(tag);
            }
        }
        if let (Some(path), Some(file_type)) = (self.file_path, self.file_type) {
            let path = PathBuf::from(path);
            if book.files.iter().any(|f| f.path == path) {
                return;
            }
            match file_type.parse::<BookFormat>() {
                Ok(format) => book.files.push(BookFile { path, format }),
                Err(e) => warn!("Ignoring catalogued file {}: {}", path.display(), e),
            }
        }
    }
}

/// Fold rows ordered by book id into one [`CatalogBook`] per id
pub(crate) fn fold_rows(rows: impl IntoIterator<Item = BookRow>) -> Vec<CatalogBook> {
    let mut books: Vec<CatalogBook> = Vec::new();
    for row in rows {
        match books.last_mut() {
            Some(book) if book.id == row.id => row.fold_into(book),
            _ => books.push(row.into_book()),
        }
    }
    books
}
