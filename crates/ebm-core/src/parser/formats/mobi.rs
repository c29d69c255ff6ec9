//! MOBI metadata from the PalmDB container.
//!
//! Record 0 holds a 16-byte PalmDOC header followed by the MOBI header; when
//! the EXTH flag is set an EXTH block follows the MOBI header. Damaged
//! headers are not fatal: the reader returns empty metadata and the title
//! falls back to the file name.

use log::debug;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::decode_latin_or_utf8;
use crate::error::Result;
use crate::parser::Metadata;

/// PalmDB header up to and including the first two record entries
const PALMDB_HEADER_LEN: usize = 94;
const RECORD_COUNT_OFFSET: usize = 76;
const RECORD_LIST_OFFSET: usize = 78;
const MAX_RECORD_LEN: u64 = 1024 * 1024;

/// Offsets inside record 0
const MOBI_MAGIC_OFFSET: usize = 16;
const MOBI_HEADER_LEN_OFFSET: usize = 20;
const TEXT_ENCODING_OFFSET: usize = 28;
const FULL_NAME_OFFSET: usize = 84;
const FULL_NAME_LEN_OFFSET: usize = 88;
const EXTH_FLAGS_OFFSET: usize = 128;

const EXTH_PRESENT: u32 = 0x40;
const ENCODING_UTF8: u32 = 65001;

const EXTH_AUTHOR: u32 = 100;
const EXTH_PUBLISHER: u32 = 101;
const EXTH_ISBN: u32 = 104;
const EXTH_SUBJECT: u32 = 105;
const EXTH_UPDATED_TITLE: u32 = 503;

pub fn read_metadata(path: &Path) -> Result<Metadata> {
    let mut file = File::open(path)?;

    let Some(record) = read_first_record(&mut file)? else {
        debug!("Truncated PalmDB header in {}", path.display());
        return Ok(Metadata::default());
    };

    Ok(parse_record(&record).unwrap_or_else(|| {
        debug!("Unreadable MOBI header in {}", path.display());
        Metadata::default()
    }))
}

fn read_first_record(file: &mut File) -> io::Result<Option<Vec<u8>>> {
    let mut header = Vec::with_capacity(PALMDB_HEADER_LEN);
    (&mut *file)
        .take(PALMDB_HEADER_LEN as u64)
        .read_to_end(&mut header)?;

    let (Some(count), Some(start)) = (
        be_u16(&header, RECORD_COUNT_OFFSET),
        be_u32(&header, RECORD_LIST_OFFSET),
    ) else {
        return Ok(None);
    };
    let start = u64::from(start);

    // Record 0 ends where record 1 starts
    let len = match be_u32(&header, RECORD_LIST_OFFSET + 8) {
        Some(next) if count > 1 && u64::from(next) > start => {
            (u64::from(next) - start).min(MAX_RECORD_LEN)
        }
        Some(_) if count > 1 => return Ok(None),
        _ => MAX_RECORD_LEN,
    };

    file.seek(SeekFrom::Start(start))?;
    let mut record = Vec::new();
    file.take(len).read_to_end(&mut record)?;
    Ok(Some(record))
}

fn parse_record(record: &[u8]) -> Option<Metadata> {
    if record.get(MOBI_MAGIC_OFFSET..MOBI_MAGIC_OFFSET + 4)? != b"MOBI" {
        return None;
    }
    let header_len = be_u32(record, MOBI_HEADER_LEN_OFFSET)? as usize;
    let encoding = be_u32(record, TEXT_ENCODING_OFFSET)?;
    let decode = |bytes: &[u8]| {
        let text = if encoding == ENCODING_UTF8 {
            String::from_utf8_lossy(bytes).into_owned()
        } else {
            decode_latin_or_utf8(bytes)
        };
        text.trim_matches(|c: char| c.is_whitespace() || c == '\0')
            .to_string()
    };

    let mut metadata = Metadata::default();

    if be_u32(record, EXTH_FLAGS_OFFSET).unwrap_or(0) & EXTH_PRESENT != 0 {
        if let Some(exth) = record.get(MOBI_MAGIC_OFFSET + header_len..) {
            read_exth(exth, &decode, &mut metadata);
        }
    }

    if metadata.title.is_empty() {
        let offset = be_u32(record, FULL_NAME_OFFSET).unwrap_or(0) as usize;
        let len = be_u32(record, FULL_NAME_LEN_OFFSET).unwrap_or(0) as usize;
        if let Some(name) = offset
            .checked_add(len)
            .and_then(|end| record.get(offset..end))
        {
            metadata.title = decode(name);
        }
    }

    Some(metadata)
}

fn read_exth(exth: &[u8], decode: &dyn Fn(&[u8]) -> String, metadata: &mut Metadata) {
    if !exth.starts_with(b"EXTH") {
        return;
    }
    let Some(count) = be_u32(exth, 8) else {
        return;
    };

    let mut pos = 12;
    for _ in 0..count {
        let (Some(kind), Some(len)) = (be_u32(exth, pos), be_u32(exth, pos + 4)) else {
            break;
        };
        let len = len as usize;
        let Some(value) = len
            .checked_sub(8)
            .and_then(|data_len| exth.get(pos + 8..pos + 8 + data_len))
        else {
            break;
        };

        let value = decode(value);
        if !value.is_empty() {
            match kind {
                EXTH_AUTHOR => metadata.authors.push(value),
                EXTH_PUBLISHER if metadata.publisher.is_empty() => metadata.publisher = value,
                EXTH_ISBN if metadata.isbn.is_empty() => metadata.isbn = value,
                EXTH_SUBJECT => metadata.tags.push(value),
                EXTH_UPDATED_TITLE if metadata.title.is_empty() => metadata.title = value,
                _ => {}
            }
        }
        pos += len;
    }
}

fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
