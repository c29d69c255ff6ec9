use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::{Connection, ToSql, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::Path;

use super::db::{open_connection, open_in_memory_connection};
use super::models::{fold_rows, BookRow};
use super::query::{build_fts5_query, placeholders, select_all, select_by_ids, select_matching};
use crate::error::{Error, Result};
use crate::types::{Book, CatalogBook};

/// Bound parameters per statement, below SQLite's historic limit of 999
const MAX_PARAMS: usize = 999;

/// Transactional catalog of books backed by SQLite
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: open_connection(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: open_in_memory_connection()?,
        })
    }

    /// Insert a batch of books atomically.
    ///
    /// `produce` runs inside the transaction and yields the final batch. If
    /// it fails, or any insert fails, nothing is committed and `rollback`
    /// runs before the error is returned. Ids are contiguous within a batch.
    pub fn create_books<F, R>(&mut self, produce: F, rollback: R) -> Result<Vec<CatalogBook>>
    where
        F: FnOnce() -> Result<Vec<Book>>,
        R: FnOnce(),
    {
        let tx = self.conn.transaction()?;

        let inserted = produce().and_then(|books| insert_books(&tx, books));
        let result = match inserted {
            Ok(books) => tx
                .commit()
                .map(|_| books)
                .map_err(|e| Error::in_transaction("committing books", e)),
            Err(e) => {
                if let Err(rollback_error) = tx.rollback() {
                    warn!("Rolling back catalog insert failed: {}", rollback_error);
                }
                Err(e)
            }
        };

        match result {
            Ok(books) => {
                info!("Catalogued {} books", books.len());
                Ok(books)
            }
            Err(e) => {
                rollback();
                Err(e)
            }
        }
    }

    /// Every book when `pattern` is blank, else books whose title, authors
    /// or tags match every term of `pattern` as a prefix
    pub fn find_books(&self, pattern: &str) -> Result<Vec<CatalogBook>> {
        let query = build_fts5_query(pattern);
        if query.is_empty() {
            return Ok(load_books(&self.conn, &select_all(), &[])?);
        }
        Ok(load_books(&self.conn, &select_matching(), &[&query as &dyn ToSql])?)
    }

    /// Books with the given ids; unknown ids are ignored
    pub fn get_books_by_ids(&self, ids: &[i64]) -> Result<Vec<CatalogBook>> {
        Ok(load_by_ids(&self.conn, ids)?)
    }

    /// Delete books in an immediate transaction.
    ///
    /// `relocate` receives the books about to be deleted and moves their
    /// files aside. If it fails, or the delete or commit fails, `restore`
    /// runs and the catalog is left unchanged. Returns the deleted books.
    pub fn remove_books<F, R>(
        &mut self,
        ids: &[i64],
        relocate: F,
        restore: R,
    ) -> Result<Vec<CatalogBook>>
    where
        F: FnOnce(&[CatalogBook]) -> Result<()>,
        R: FnOnce(),
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let books = load_by_ids(&tx, ids).map_err(|e| Error::in_transaction("loading books", e))?;
        let unique: BTreeSet<i64> = ids.iter().copied().collect();
        if books.len() < unique.len() {
            let missing: Vec<i64> = unique
                .iter()
                .filter(|id| !books.iter().any(|b| b.id == **id))
                .copied()
                .collect();
            warn!("No catalogued books with ids {:?}", missing);
        }
        if books.is_empty() {
            return Ok(books);
        }

        if let Err(e) = relocate(&books) {
            restore();
            return Err(e);
        }

        let found: Vec<i64> = books.iter().map(|b| b.id).collect();
        if let Err(e) = delete_books(&tx, &found) {
            restore();
            if let Err(rollback_error) = tx.rollback() {
                warn!("Rolling back catalog delete failed: {}", rollback_error);
            }
            return Err(e);
        }

        if let Err(e) = tx.commit() {
            restore();
            return Err(Error::in_transaction("committing removal", e));
        }

        info!("Removed {} books from the catalog", books.len());
        Ok(books)
    }

    pub fn book_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM Books", [], |row| row.get(0))?)
    }

    /// Raw connection for installing fault-injection triggers in tests
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn load_books(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> rusqlite::Result<Vec<CatalogBook>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, BookRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(fold_rows(rows))
}

fn load_by_ids(conn: &Connection, ids: &[i64]) -> rusqlite::Result<Vec<CatalogBook>> {
    let unique: Vec<i64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();

    let mut books = Vec::new();
    for chunk in unique.chunks(MAX_PARAMS) {
        let params: Vec<&dyn ToSql> = chunk.iter().map(|id| id as &dyn ToSql).collect();
        books.extend(load_books(conn, &select_by_ids(chunk.len()), &params)?);
    }
    Ok(books)
}

fn delete_books(tx: &Transaction<'_>, ids: &[i64]) -> Result<()> {
    for chunk in ids.chunks(MAX_PARAMS) {
        let sql = format!("DELETE FROM Books WHERE book_id IN ({})", placeholders(chunk.len()));
        let params: Vec<&dyn ToSql> = chunk.iter().map(|id| id as &dyn ToSql).collect();
        tx.execute(&sql, params.as_slice())
            .map_err(|e| Error::in_transaction("deleting books", e))?;
    }
    Ok(())
}

/// Insert books, then files, then authors and tags with their junctions,
/// then the full-text entries
fn insert_books(tx: &Transaction<'_>, books: Vec<Book>) -> Result<Vec<CatalogBook>> {
    if books.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(book) = books.iter().find(|b| b.files().is_empty()) {
        return Err(Error::IntegrityViolation(format!(
            "book '{}' has no files",
            book.title
        )));
    }

    let now = Utc::now().to_rfc3339();

    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(books.len() * 5);
    for book in &books {
        values.extend([&book.title as &dyn ToSql, &book.isbn, &book.publisher, &now, &now]);
    }
    let mut ids: Vec<i64> = Vec::with_capacity(books.len());
    insert_values(
        tx,
        "inserting books",
        "INSERT INTO Books (title, isbn, publisher, created_at, modified_at) VALUES {values}",
        5,
        &values,
        |rows| {
            // One multi-row insert assigns consecutive AUTOINCREMENT ids
            let last = tx.last_insert_rowid();
            ids.extend(last - rows as i64 + 1..=last);
        },
    )?;
    debug!("Inserted book rows {:?}", ids.first().zip(ids.last()));

    let paths: Vec<Vec<String>> = books
        .iter()
        .map(|b| {
            b.files()
                .iter()
                .map(|f| f.path.to_string_lossy().into_owned())
                .collect()
        })
        .collect();
    let mut values: Vec<&dyn ToSql> = Vec::new();
    for ((book, id), book_paths) in books.iter().zip(&ids).zip(&paths) {
        for (file, path) in book.files().iter().zip(book_paths) {
            values.extend([id as &dyn ToSql, path, &file.format, &now, &now]);
        }
    }
    insert_values(
        tx,
        "inserting book files",
        "INSERT INTO BookFiles (book_id, file_path, file_type, created_at, modified_at) VALUES {values}",
        5,
        &values,
        |_| {},
    )?;

    let mut names: Vec<&dyn ToSql> = Vec::new();
    let mut links: Vec<&dyn ToSql> = Vec::new();
    for (book, id) in books.iter().zip(&ids) {
        for author in book.authors().iter().filter(|a| !a.is_empty()) {
            names.push(author);
            links.extend([id as &dyn ToSql, author]);
        }
    }
    insert_values(
        tx,
        "inserting authors",
        "INSERT INTO Authors (author) VALUES {values} ON CONFLICT(author) DO NOTHING",
        1,
        &names,
        |_| {},
    )?;
    insert_values(
        tx,
        "linking authors",
        "INSERT INTO BookAuthors (book_id, author) VALUES {values} ON CONFLICT(book_id, author) DO NOTHING",
        2,
        &links,
        |_| {},
    )?;

    let mut names: Vec<&dyn ToSql> = Vec::new();
    let mut links: Vec<&dyn ToSql> = Vec::new();
    for (book, id) in books.iter().zip(&ids) {
        for tag in book.tags().iter().filter(|t| !t.is_empty()) {
            names.push(tag);
            links.extend([id as &dyn ToSql, tag]);
        }
    }
    insert_values(
        tx,
        "inserting tags",
        "INSERT INTO Tags (tag) VALUES {values} ON CONFLICT(tag) DO NOTHING",
        1,
        &names,
        |_| {},
    )?;
    insert_values(
        tx,
        "linking tags",
        "INSERT INTO BookTags (book_id, tag) VALUES {values} ON CONFLICT(book_id, tag) DO NOTHING",
        2,
        &links,
        |_| {},
    )?;

    let search_text: Vec<(String, String)> = books
        .iter()
        .map(|b| (b.authors().join(" "), b.tags().join(" ")))
        .collect();
    let mut values: Vec<&dyn ToSql> = Vec::new();
    for ((book, id), (authors, tags)) in books.iter().zip(&ids).zip(&search_text) {
        values.extend([id as &dyn ToSql, &book.title, authors, tags]);
    }
    insert_values(
        tx,
        "indexing books",
        "INSERT INTO BooksFts (book_id, title, authors, tags) VALUES {values}",
        4,
        &values,
        |_| {},
    )?;

    Ok(books
        .into_iter()
        .zip(ids)
        .map(|(book, id)| CatalogBook {
            id,
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            publisher: book.publisher.clone(),
            authors: book.authors().to_vec(),
            tags: book.tags().to_vec(),
            files: book.files().to_vec(),
            created_at: now.clone(),
            modified_at: now.clone(),
        })
        .collect())
}

/// Multi-row insert of `values`, `width` columns per row, split into
/// statements that stay under [`MAX_PARAMS`]. `inserted` is told how many
/// rows each statement wrote.
fn insert_values(
    tx: &Transaction<'_>,
    step: &'static str,
    template: &str,
    width: usize,
    values: &[&dyn ToSql],
    mut inserted: impl FnMut(usize),
) -> Result<()> {
    let row = format!("({})", placeholders(width));
    let rows_per_statement = MAX_PARAMS / width;

    for chunk in values.chunks(rows_per_statement * width) {
        let rows = chunk.len() / width;
        let sql = template.replacen("{values}", &vec![row.as_str(); rows].join(", "), 1);
        tx.execute(&sql, chunk)
            .map_err(|e| Error::in_transaction(step, e))?;
        inserted(rows);
    }
    Ok(())
}
