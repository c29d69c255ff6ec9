use log::{debug, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Books (
        book_id     INTEGER PRIMARY KEY AUTOINCREMENT,
        title       TEXT NOT NULL,
        isbn        TEXT NOT NULL DEFAULT '',
        publisher   TEXT NOT NULL DEFAULT '',
        created_at  TEXT NOT NULL,
        modified_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS BookFiles (
        file_id     INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id     INTEGER NOT NULL REFERENCES Books(book_id) ON DELETE CASCADE,
        file_path   TEXT NOT NULL UNIQUE,
        file_type   TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        modified_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_book_files_book ON BookFiles(book_id);

    CREATE TABLE IF NOT EXISTS Authors (
        author TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS Tags (
        tag TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS BookAuthors (
        book_id INTEGER NOT NULL REFERENCES Books(book_id) ON DELETE CASCADE,
        author  TEXT NOT NULL REFERENCES Authors(author),
        UNIQUE (book_id, author)
    );

    CREATE TABLE IF NOT EXISTS BookTags (
        book_id INTEGER NOT NULL REFERENCES Books(book_id) ON DELETE CASCADE,
        tag     TEXT NOT NULL REFERENCES Tags(tag),
        UNIQUE (book_id, tag)
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS BooksFts USING fts5(
        book_id UNINDEXED,
        title,
        authors,
        tags,
        tokenize = 'unicode61 remove_diacritics 1'
    );

    CREATE TRIGGER IF NOT EXISTS Books_ad AFTER DELETE ON Books BEGIN
        DELETE FROM BooksFts WHERE book_id = OLD.book_id;
    END;
";

/// Open (creating if needed) the catalog database at `path`
pub fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    prepare(&conn)?;
    info!("Catalog opened at {}", path.display());
    Ok(conn)
}

/// A private in-memory catalog
pub fn open_in_memory_connection() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(conn)
}

fn prepare(conn: &Connection) -> Result<()> {
    enable_foreign_keys(conn)?;
    conn.execute_batch(SCHEMA)?;
    debug!("Catalog schema ready");
    Ok(())
}

/// Refuse to continue unless SQLite confirms foreign keys are enforced
fn enable_foreign_keys(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    let enabled: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    if enabled != 1 {
        return Err(Error::IntegrityViolation(
            "foreign key enforcement could not be enabled".to_string(),
        ));
    }
    Ok(())
}
