//! Concurrent discovery of e-books.
//!
//! A single producer walks the directory tree and feeds paths through a
//! bounded channel to `workers` parser threads. Parsed files are merged into
//! logical books by exact title under one short-held lock.

use crossbeam::channel;
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread;
use walkdir::{DirEntry, WalkDir};

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::parser::{FileParser, MetadataParser, ParsedBook};
use crate::types::Book;

/// Turns a file or directory tree into deduplicated books
pub struct Collector<P = FileParser> {
    parser: P,
    workers: usize,
    recursive: bool,
    cancel: CancellationToken,
}

impl Collector<FileParser> {
    pub fn new(workers: usize, recursive: bool) -> Self {
        Self::with_parser(FileParser, workers, recursive)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.workers, config.recursive)
    }
}

impl<P: MetadataParser> Collector<P> {
    pub fn with_parser(parser: P, workers: usize, recursive: bool) -> Self {
        Self {
            parser,
            workers: workers.max(1),
            recursive,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the scan when `token` is cancelled from outside
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Collect the books under `root`.
    ///
    /// A regular file is parsed directly and must be a supported e-book.
    /// In a directory, unsupported files are skipped and any other failure
    /// aborts the whole scan.
    pub fn collect(&self, root: &Path) -> Result<Vec<Book>> {
        let metadata = fs::metadata(root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(root.to_path_buf()),
            _ => Error::Io(e),
        })?;
        self.cancel.check()?;

        if !metadata.is_dir() {
            let parsed = self.parser.parse(root)?;
            return Ok(vec![parsed.into_book()]);
        }

        let books = self.collect_directory(root)?;
        info!(
            "Collected {} books from {} with {} workers",
            books.len(),
            root.display(),
            self.workers
        );
        Ok(books)
    }

    fn collect_directory(&self, root: &Path) -> Result<Vec<Book>> {
        let (sender, receiver) = channel::bounded::<PathBuf>(self.workers * 2);
        let scan = Scan {
            merged: Mutex::new(Merged::default()),
            failure: Mutex::new(None),
            stopped: CancellationToken::new(),
        };

        thread::scope(|s| {
            for _ in 0..self.workers {
                let receiver = receiver.clone();
                let scan = &scan;
                s.spawn(move || {
                    // Drain the queue even after a stop so the producer never blocks
                    for path in receiver.iter() {
                        if scan.is_stopped(&self.cancel) {
                            continue;
                        }
                        match self.parser.parse(&path) {
                            Ok(parsed) => scan.merge(parsed),
                            Err(e) if e.is_unsupported() => {
                                debug!("Skipping unsupported file {}", path.display());
                            }
                            Err(e) => scan.fail(e),
                        }
                    }
                });
            }
            drop(receiver);

            for entry in self.walker(root) {
                if scan.is_stopped(&self.cancel) {
                    break;
                }
                match entry {
                    Ok(entry) if is_file(&entry) => {
                        if sender.send(entry.into_path()).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        scan.fail(e.into());
                        break;
                    }
                }
            }
            drop(sender);
        });

        if let Some(error) = scan.failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(error);
        }
        self.cancel.check()?;

        Ok(scan
            .merged
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .books)
    }

    fn walker(&self, root: &Path) -> walkdir::IntoIter {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));
        if self.recursive {
            walker.into_iter()
        } else {
            walker.max_depth(1).into_iter()
        }
    }
}

/// Regular files, and symlinks that resolve to one
fn is_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

/// State shared between the producer and the parser workers
struct Scan {
    merged: Mutex<Merged>,
    failure: Mutex<Option<Error>>,
    stopped: CancellationToken,
}

impl Scan {
    fn is_stopped(&self, external: &CancellationToken) -> bool {
        self.stopped.is_cancelled() || external.is_cancelled()
    }

    fn merge(&self, parsed: ParsedBook) {
        self.merged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(parsed);
    }

    /// Keep the first fatal error and stop everyone else
    fn fail(&self, error: Error) {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            debug!("Scan aborted: {}", error);
            *failure = Some(error);
        }
        self.stopped.cancel();
    }
}

#[derive(Default)]
struct Merged {
    titles: HashMap<String, usize>,
    books: Vec<Book>,
}

impl Merged {
    fn add(&mut self, parsed: ParsedBook) {
        match self.titles.get(&parsed.metadata.title) {
            Some(&index) => {
                let book = &mut self.books[index];
                book.append_file(parsed.file.path, parsed.file.format);
                for author in parsed.metadata.authors {
                    book.append_author(author);
                }
                for tag in parsed.metadata.tags {
                    book.append_tag(tag);
                }
            }
            None => {
                self.titles
                    .insert(parsed.metadata.title.clone(), self.books.len());
                self.books.push(parsed.into_book());
            }
        }
    }
}
