#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use ebm_core::Config;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A temporary source directory filled with small e-book files
pub struct Shelf {
    dir: TempDir,
}

impl Shelf {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A PDF with `/Title`, `/Author` and `/Subject` entries
    pub fn pdf(&self, name: &str, title: &str, author: &str, subject: &str) -> PathBuf {
        let content = format!(
            "%PDF-1.7\n\
             1 0 obj\n<< /Type /Catalog /Pages 3 0 R >>\nendobj\n\
             4 0 obj\n<< /Title ({}) /Author ({}) /Subject ({}) /Producer (test) >>\nendobj\n\
             xref\n0 5\n\
             trailer\n<< /Size 5 /Root 1 0 R /Info 4 0 R >>\nstartxref\n0\n%%EOF\n",
            title, author, subject
        );
        self.write(name, content.as_bytes())
    }

    /// An EPUB 2 package with its OPF under `OEBPS/`
    pub fn epub(&self, name: &str, title: &str, authors: &[&str], isbn: &str) -> PathBuf {
        let creators: String = authors
            .iter()
            .map(|a| format!(r#"<dc:creator opf:role="aut">{}</dc:creator>"#, a))
            .collect();
        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>{}</dc:title>
    {}
    <dc:identifier id="id" opf:scheme="ISBN">{}</dc:identifier>
    <dc:publisher>Test Press</dc:publisher>
  </metadata>
  <manifest/>
  <spine/>
</package>"#,
            title, creators, isbn
        );
        let container = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (entry, content) in [
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", container),
            ("OEBPS/content.opf", opf.as_str()),
        ] {
            zip.start_file(entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        let bytes = zip.finish().unwrap().into_inner();
        self.write(name, &bytes)
    }

    /// A MOBI file whose EXTH block carries an author and an updated title
    pub fn mobi(&self, name: &str, title: &str, author: &str) -> PathBuf {
        let bytes = mobi_bytes("placeholder", &[(100, author), (503, title)]);
        self.write(name, &bytes)
    }

    pub fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }
}

fn mobi_bytes(full_name: &str, exth: &[(u32, &str)]) -> Vec<u8> {
    const MOBI_HEADER_LEN: usize = 232;
    const RECORD_START: usize = 96;

    let mut entries = Vec::new();
    for (kind, value) in exth {
        entries.extend_from_slice(&kind.to_be_bytes());
        entries.extend_from_slice(&(8 + value.len() as u32).to_be_bytes());
        entries.extend_from_slice(value.as_bytes());
    }

    let mut record = vec![0u8; 16 + MOBI_HEADER_LEN];
    record[16..20].copy_from_slice(b"MOBI");
    record[20..24].copy_from_slice(&(MOBI_HEADER_LEN as u32).to_be_bytes());
    record[28..32].copy_from_slice(&65001u32.to_be_bytes());
    record[128..132].copy_from_slice(&0x40u32.to_be_bytes());
    record.extend_from_slice(b"EXTH");
    record.extend_from_slice(&(12 + entries.len() as u32).to_be_bytes());
    record.extend_from_slice(&(exth.len() as u32).to_be_bytes());
    record.extend_from_slice(&entries);
    let name_offset = record.len() as u32;
    record.extend_from_slice(full_name.as_bytes());
    record[84..88].copy_from_slice(&name_offset.to_be_bytes());
    record[88..92].copy_from_slice(&(full_name.len() as u32).to_be_bytes());

    let mut file = vec![0u8; RECORD_START];
    file[..8].copy_from_slice(b"fixture\0");
    file[60..64].copy_from_slice(b"BOOK");
    file[64..68].copy_from_slice(b"MOBI");
    file[76..78].copy_from_slice(&1u16.to_be_bytes());
    file[78..82].copy_from_slice(&(RECORD_START as u32).to_be_bytes());
    file.extend_from_slice(&record);
    file
}

/// A library and quarantine inside one temporary directory
pub struct LibraryDirs {
    dir: TempDir,
}

impl LibraryDirs {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn library(&self) -> PathBuf {
        self.dir.path().join("library")
    }

    pub fn quarantine(&self) -> PathBuf {
        self.dir.path().join("quarantine")
    }

    pub fn export(&self) -> PathBuf {
        self.dir.path().join("export")
    }

    pub fn config(&self, workers: usize) -> Config {
        Config {
            library_dir: self.library(),
            quarantine_dir: Some(self.quarantine()),
            workers,
            ..Default::default()
        }
    }
}

/// Every regular file below `dir`, sorted
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}
