//! Content sniffing by magic bytes. File extensions are never consulted.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::types::BookFormat;

/// Bytes needed to recognise every supported format (MOBI marker ends at 68)
const HEADER_LEN: usize = 68;

/// Sniff the format of the file at `path`
pub fn sniff_format(path: &Path) -> io::Result<Option<BookFormat>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut header)?;
    Ok(detect_format(&header))
}

/// Detect the format from the leading bytes of a file
pub fn detect_format(header: &[u8]) -> Option<BookFormat> {
    if is_pdf(header) {
        Some(BookFormat::Pdf)
    } else if is_epub(header) {
        Some(BookFormat::Epub)
    } else if is_mobi(header) {
        Some(BookFormat::Mobi)
    } else {
        None
    }
}

/// `%PDF-` followed by a version whose minor digit is 0-7, then CR or LF
fn is_pdf(header: &[u8]) -> bool {
    header.len() >= 10
        && header.starts_with(b"%PDF-")
        && (b'0'..=b'7').contains(&header[7])
        && matches!(header[8], b'\r' | b'\n')
}

/// ZIP local file header
fn is_epub(header: &[u8]) -> bool {
    header.starts_with(b"PK\x03\x04")
}

/// PalmDB type/creator `BOOK`/`MOBI` at offsets 60 and 64
fn is_mobi(header: &[u8]) -> bool {
    header.len() >= 68 && &header[60..64] == b"BOOK" && &header[64..68] == b"MOBI"
}
