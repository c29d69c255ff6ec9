mod common;

use common::{files_under, LibraryDirs, Shelf};
use ebm_core::{Book, BookFormat, Ebm, Error, LibraryManager, NoReview, Result, Reviewer};
use std::fs;

#[test]
fn test_import_lays_out_library_and_catalogues_books() {
    let shelf = Shelf::new();
    shelf.pdf("1.pdf", "Foo", "Al", "");
    shelf.epub("2.epub", "Foo", &["Bo"], "");
    let dirs = LibraryDirs::new();

    let mut ebm = Ebm::new(dirs.config(1)).unwrap();
    let imported = ebm.import(shelf.path(), false, &NoReview).unwrap();

    assert_eq!(imported.len(), 1);
    let book_dir = dirs.library().join("Al,Bo").join("Foo");
    assert_eq!(
        files_under(&book_dir),
        vec![book_dir.join("Foo - Al,Bo.epub"), book_dir.join("Foo - Al,Bo.pdf")]
    );

    let found = ebm.library().find_books("Foo").unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].id > 0);
    assert_eq!(found[0].authors, vec!["Al", "Bo"]);
    assert_eq!(found[0].formats(), vec![BookFormat::Pdf, BookFormat::Epub]);
}

#[test]
fn test_catalog_survives_reopening() {
    let shelf = Shelf::new();
    shelf.pdf("a.pdf", "The Rust Programming Language", "Steve Klabnik/Carol Nichols", "rust");
    shelf.mobi("b.mobi", "Dune", "Frank Herbert");
    let dirs = LibraryDirs::new();

    {
        let mut ebm = Ebm::new(dirs.config(2)).unwrap();
        ebm.import(shelf.path(), false, &NoReview).unwrap();
    }

    let library = LibraryManager::open(&dirs.config(2)).unwrap();
    assert_eq!(library.find_books("").unwrap().len(), 2);

    // Prefix search over titles, authors and tags
    let by_author = library.find_books("klab").unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0].title, "The Rust Programming Language");
    assert_eq!(library.find_books("rust lang").unwrap().len(), 1);
    assert_eq!(library.find_books("herbert").unwrap()[0].title, "Dune");
    assert!(library.find_books("tolkien").unwrap().is_empty());
}

#[test]
fn test_search_input_is_not_query_syntax() {
    let shelf = Shelf::new();
    shelf.pdf("a.pdf", "C++ Primer", "Lippman", "");
    let dirs = LibraryDirs::new();
    let mut ebm = Ebm::new(dirs.config(1)).unwrap();
    ebm.import(shelf.path(), false, &NoReview).unwrap();

    for pattern in ["C++", "\"unbalanced", "NEAR(", "title:*", "AND OR NOT"] {
        assert!(
            ebm.library().find_books(pattern).is_ok(),
            "pattern {:?} failed",
            pattern
        );
    }
}

#[test]
fn test_reimport_skips_existing_files() {
    let shelf = Shelf::new();
    shelf.pdf("a.pdf", "Foo", "Al", "");
    let dirs = LibraryDirs::new();
    let mut ebm = Ebm::new(dirs.config(2)).unwrap();

    let first = ebm.import(shelf.path(), false, &NoReview).unwrap();
    let second = ebm.import(shelf.path(), false, &NoReview).unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(ebm.library().find_books("").unwrap().len(), 1);
}

/// Renames every book, standing in for an edited review file
struct Retitle;

impl Reviewer for Retitle {
    fn review(&self, books: Vec<Book>) -> Result<Vec<Book>> {
        Ok(books
            .into_iter()
            .map(|mut book| {
                book.title = format!("{} (Reviewed)", book.title);
                book
            })
            .collect())
    }
}

#[test]
fn test_reviewed_metadata_is_imported() {
    let shelf = Shelf::new();
    shelf.pdf("a.pdf", "Foo", "Al", "");
    let dirs = LibraryDirs::new();
    let mut ebm = Ebm::new(dirs.config(1)).unwrap();

    ebm.import(shelf.path(), false, &Retitle).unwrap();

    let found = ebm.library().find_books("reviewed").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Foo (Reviewed)");
    assert!(dirs
        .library()
        .join("Al")
        .join("Foo (Reviewed)")
        .join("Foo (Reviewed) - Al.pdf")
        .is_file());
}

/// Fails like an editor that exited with an error
struct Reject;

impl Reviewer for Reject {
    fn review(&self, _books: Vec<Book>) -> Result<Vec<Book>> {
        Err(Error::Review("editor exited with status 1".to_string()))
    }
}

#[test]
fn test_failed_review_imports_nothing() {
    let shelf = Shelf::new();
    shelf.pdf("a.pdf", "Foo", "Al", "");
    let dirs = LibraryDirs::new();
    let mut ebm = Ebm::new(dirs.config(1)).unwrap();

    let err = ebm.import(shelf.path(), false, &Reject).unwrap_err();

    assert!(matches!(err, Error::Review(_)));
    assert!(ebm.library().find_books("").unwrap().is_empty());
    assert_eq!(
        files_under(&dirs.library()),
        vec![dirs.library().join(ebm_core::CATALOG_FILE_NAME)]
    );
}

#[test]
fn test_remove_then_export() {
    let shelf = Shelf::new();
    shelf.pdf("a.pdf", "Foo", "Al", "");
    shelf.epub("b.epub", "Bar", &["Bo"], "");
    let dirs = LibraryDirs::new();
    let mut ebm = Ebm::new(dirs.config(2)).unwrap();
    ebm.import(shelf.path(), false, &NoReview).unwrap();

    let all = ebm.library().find_books("").unwrap();
    let foo = all.iter().find(|b| b.title == "Foo").unwrap().id;
    let bar = all.iter().find(|b| b.title == "Bar").unwrap().id;

    let removed = ebm.library_mut().remove_books(&[foo, 9999]).unwrap();
    assert_eq!(removed.len(), 1);
    assert!(!dirs.library().join("Al").exists());
    assert!(files_under(&dirs.quarantine()).is_empty());

    let summary = ebm.library().export_books(&[foo, bar], &dirs.export()).unwrap();
    assert!(summary.failed.is_empty());
    assert_eq!(summary.copied, vec![dirs.export().join("Bar - Bo.epub")]);
    assert_eq!(
        fs::read(dirs.export().join("Bar - Bo.epub")).unwrap(),
        fs::read(shelf.path().join("b.epub")).unwrap()
    );
}

#[test]
fn test_removing_unknown_ids_changes_nothing() {
    let shelf = Shelf::new();
    shelf.pdf("a.pdf", "Foo", "Al", "");
    let dirs = LibraryDirs::new();
    let mut ebm = Ebm::new(dirs.config(1)).unwrap();
    ebm.import(shelf.path(), false, &NoReview).unwrap();

    let removed = ebm.library_mut().remove_books(&[424242]).unwrap();

    assert!(removed.is_empty());
    assert_eq!(ebm.library().find_books("").unwrap().len(), 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dirs = LibraryDirs::new();
    let mut config = dirs.config(1);
    config.quarantine_dir = Some(dirs.library().join("quarantine"));

    assert!(matches!(Ebm::new(config), Err(Error::Configuration(_))));
}
