//! Minimal e-book fixtures for unit tests.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A PDF whose info dictionary carries a title and an author field
pub fn pdf_bytes(title: &str, author: &str) -> Vec<u8> {
    format!(
        "%PDF-1.4\n\
         1 0 obj\n<< /Type /Catalog >>\nendobj\n\
         2 0 obj\n<< /Title ({}) /Author ({}) >>\nendobj\n\
         trailer\n<< /Root 1 0 R /Info 2 0 R >>\n%%EOF\n",
        title, author
    )
    .into_bytes()
}

/// An EPUB with a container pointing at a minimal OPF
pub fn epub_bytes(title: &str, authors: &[&str]) -> Vec<u8> {
    let creators: String = authors
        .iter()
        .map(|a| format!("<dc:creator>{}</dc:creator>", a))
        .collect();
    let opf = format!(
        r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/">
<metadata><dc:title>{}</dc:title>{}</metadata></package>"#,
        title, creators
    );
    let container = r#"<?xml version="1.0"?>
<container><rootfiles><rootfile full-path="content.opf" media-type="application/oebps-package+xml"/></rootfiles></container>"#;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("mimetype", "application/epub+zip"),
        ("META-INF/container.xml", container),
        ("content.opf", opf.as_str()),
    ] {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A single-record PalmDB/MOBI file with the given full name and EXTH records
pub fn mobi_bytes(full_name: &str, exth: &[(u32, &str)]) -> Vec<u8> {
    const MOBI_HEADER_LEN: usize = 232;
    const RECORD_START: usize = 88;

    let mut records = Vec::new();
    for (kind, value) in exth {
        records.extend_from_slice(&kind.to_be_bytes());
        records.extend_from_slice(&(8 + value.len() as u32).to_be_bytes());
        records.extend_from_slice(value.as_bytes());
    }

    let mut record = vec![0u8; 16 + MOBI_HEADER_LEN];
    record[16..20].copy_from_slice(b"MOBI");
    record[20..24].copy_from_slice(&(MOBI_HEADER_LEN as u32).to_be_bytes());
    record[24..28].copy_from_slice(&2u32.to_be_bytes());
    record[28..32].copy_from_slice(&65001u32.to_be_bytes());
    record[128..132].copy_from_slice(&0x40u32.to_be_bytes());

    record.extend_from_slice(b"EXTH");
    record.extend_from_slice(&(12 + records.len() as u32).to_be_bytes());
    record.extend_from_slice(&(exth.len() as u32).to_be_bytes());
    record.extend_from_slice(&records);

    let name_offset = record.len() as u32;
    record.extend_from_slice(full_name.as_bytes());
    record[84..88].copy_from_slice(&name_offset.to_be_bytes());
    record[88..92].copy_from_slice(&(full_name.len() as u32).to_be_bytes());
    record.extend_from_slice(&[0, 0]);

    let mut file = vec![0u8; RECORD_START];
    file[..4].copy_from_slice(b"test");
    file[60..64].copy_from_slice(b"BOOK");
    file[64..68].copy_from_slice(b"MOBI");
    file[76..78].copy_from_slice(&1u16.to_be_bytes());
    file[78..82].copy_from_slice(&(RECORD_START as u32).to_be_bytes());
    file.extend_from_slice(&record);
    file
}

/// Write `content` to `dir/name`, creating parent directories
pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}
