//! SQL text for catalog lookups and FTS5 query building.

/// Flat join of every book with its files, authors and tags.
///
/// Rows come out grouped by book and in insertion order inside each book,
/// which is what [`super::models::fold_rows`] relies on.
pub(crate) const SELECT_BOOKS: &str = "
    SELECT b.book_id, b.title, b.isbn, b.publisher, b.created_at, b.modified_at,
           bf.file_path, bf.file_type, ba.author, bt.tag
    FROM Books b
    LEFT JOIN BookFiles bf ON bf.book_id = b.book_id
    LEFT JOIN BookAuthors ba ON ba.book_id = b.book_id
    LEFT JOIN BookTags bt ON bt.book_id = b.book_id";

pub(crate) const ORDER_BOOKS: &str = "ORDER BY b.book_id, bf.file_id, ba.rowid, bt.rowid";

/// Books whose full-text entry matches `?1`
pub(crate) fn select_matching() -> String {
    format!(
        "{} WHERE b.book_id IN (SELECT book_id FROM BooksFts WHERE BooksFts MATCH ?1) {}",
        SELECT_BOOKS, ORDER_BOOKS
    )
}

pub(crate) fn select_all() -> String {
    format!("{} {}", SELECT_BOOKS, ORDER_BOOKS)
}

/// Books with one of `count` ids
pub(crate) fn select_by_ids(count: usize) -> String {
    format!(
        "{} WHERE b.book_id IN ({}) {}",
        SELECT_BOOKS,
        placeholders(count),
        ORDER_BOOKS
    )
}

/// `?, ?, ...` with `count` parameters
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Escape a single term for FTS5: wrap it in quotes, doubling inner quotes
pub fn escape_fts5_term(term: &str) -> String {
    format!("\"{}\"", term.replace('"', "\"\""))
}

/// Turn free text into an FTS5 query.
///
/// Every whitespace-separated term must match as a prefix, so punctuation
/// in titles cannot break the MATCH syntax:
/// - `foo` → `"foo"*`
/// - `rust in action` → `"rust"* "in"* "action"*`
/// - `c++` → `"c++"*`
pub fn build_fts5_query(search: &str) -> String {
    search
        .split_whitespace()
        .map(|term| format!("{}*", escape_fts5_term(term)))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fts5_query() {
        assert_eq!(build_fts5_query("Foo"), "\"Foo\"*");
        assert_eq!(build_fts5_query("  rust   in action "), "\"rust\"* \"in\"* \"action\"*");
        assert_eq!(build_fts5_query("say \"hi\""), "\"say\"* \"\"\"hi\"\"\"*");
        assert_eq!(build_fts5_query("   "), "");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
