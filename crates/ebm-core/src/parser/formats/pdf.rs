//! PDF document information dictionary reader.
//!
//! Only the uncompressed parts of the file are inspected: the trailer's
//! `/Info` entry is resolved to its object and the string entries of that
//! dictionary are decoded. Documents whose info object lives inside a
//! compressed object stream yield empty metadata, and the caller falls
//! back to the file name.

use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::{decode_latin_or_utf8, split_field};
use crate::error::Result;
use crate::parser::Metadata;

/// Bytes read from each end of large files
const WINDOW: u64 = 1024 * 1024;

pub fn read_metadata(path: &Path) -> Result<Metadata> {
    let data = read_head_and_tail(path, WINDOW)?;

    let Some(info) = find_info_dictionary(&data) else {
        debug!("No readable info dictionary in {}", path.display());
        return Ok(Metadata::default());
    };

    let entries = dictionary_strings(info);
    let text = |key: &str| entries.get(key).cloned().unwrap_or_default();

    Ok(Metadata {
        isbn: text("ISBN"),
        title: text("Title"),
        authors: split_field(&text("Author")),
        publisher: text("Creator"),
        tags: split_field(&text("Subject")),
    })
}

fn read_head_and_tail(path: &Path, window: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let mut data = Vec::new();
    if len <= 2 * window {
        file.read_to_end(&mut data)?;
        return Ok(data);
    }

    (&mut file).take(window).read_to_end(&mut data)?;
    file.seek(SeekFrom::End(-(window as i64)))?;
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Locate the info dictionary; the returned slice starts at its `<<`.
fn find_info_dictionary(data: &[u8]) -> Option<&[u8]> {
    let mut end = data.len();
    let info_at = loop {
        let at = rfind(&data[..end], b"/Info")?;
        // Reject longer names such as /InfoFoo
        match data.get(at + 5) {
            Some(c) if c.is_ascii_alphanumeric() => end = at,
            _ => break at,
        }
    };

    let rest = skip_ws(&data[info_at + 5..]);
    if rest.starts_with(b"<<") {
        return Some(rest);
    }

    let (number, rest) = take_int(rest)?;
    let (generation, rest) = take_int(skip_ws(rest))?;
    if !skip_ws(rest).starts_with(b"R") {
        return None;
    }

    let header = format!("{} {} obj", number, generation);
    let object_at = find_object(data, header.as_bytes())?;
    let body = skip_ws(&data[object_at + header.len()..]);
    body.starts_with(b"<<").then_some(body)
}

/// Last definition of an object; newer revisions are appended at the end.
fn find_object(data: &[u8], header: &[u8]) -> Option<usize> {
    data.windows(header.len())
        .enumerate()
        .filter(|(i, window)| *window == header && (*i == 0 || !data[i - 1].is_ascii_digit()))
        .map(|(i, _)| i)
        .last()
}

/// String-valued entries of the top level of a dictionary starting at `<<`
fn dictionary_strings(dict: &[u8]) -> HashMap<String, String> {
    let body = dict.strip_prefix(b"<<").unwrap_or(dict);
    let mut entries = HashMap::new();
    let mut pending_key: Option<String> = None;
    let mut depth = 0usize;
    let mut i = 0;

    while i < body.len() {
        match body[i] {
            b'(' => {
                let (bytes, next) = parse_literal(body, i);
                if depth == 0 {
                    if let Some(key) = pending_key.take() {
                        entries.entry(key).or_insert_with(|| decode_text(&bytes));
                    }
                }
                i = next;
                continue;
            }
            b'<' if body.get(i + 1) == Some(&b'<') => {
                depth += 1;
                pending_key = None;
                i += 2;
                continue;
            }
            b'>' if body.get(i + 1) == Some(&b'>') => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                i += 2;
                continue;
            }
            b'<' => {
                let (bytes, next) = parse_hex(body, i);
                if depth == 0 {
                    if let Some(key) = pending_key.take() {
                        entries.entry(key).or_insert_with(|| decode_text(&bytes));
                    }
                }
                i = next;
                continue;
            }
            b'[' => {
                depth += 1;
                pending_key = None;
            }
            b']' => depth = depth.saturating_sub(1),
            b'/' => {
                let (name, next) = read_name(body, i + 1);
                if depth == 0 {
                    pending_key = Some(name);
                }
                i = next;
                continue;
            }
            c if c.is_ascii_whitespace() => {}
            _ => {
                if depth == 0 {
                    pending_key = None;
                }
            }
        }
        i += 1;
    }

    entries
}

/// Literal string starting at `(`; returns the raw bytes and the index after `)`
fn parse_literal(data: &[u8], start: usize) -> (Vec<u8>, usize) {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut i = start;

    while i < data.len() {
        match data[i] {
            b'(' => {
                if depth > 0 {
                    out.push(b'(');
                }
                depth += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return (out, i + 1);
                }
                out.push(b')');
            }
            b'\\' => {
                i += 1;
                let Some(&escaped) = data.get(i) else {
                    break;
                };
                match escaped {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'0'..=b'7' => {
                        let mut value = 0u32;
                        let mut digits = 0;
                        while digits < 3 {
                            match data.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    digits += 1;
                                    i += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push(value as u8);
                        continue;
                    }
                    // Line continuation
                    b'\r' => {
                        if data.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    }
                    b'\n' => {}
                    other => out.push(other),
                }
            }
            c => out.push(c),
        }
        i += 1;
    }

    (out, data.len())
}

/// Hex string starting at `<`; returns the decoded bytes and the index after `>`
fn parse_hex(data: &[u8], start: usize) -> (Vec<u8>, usize) {
    let mut digits = Vec::new();
    let mut i = start + 1;
    while i < data.len() && data[i] != b'>' {
        if let Some(d) = (data[i] as char).to_digit(16) {
            digits.push(d as u8);
        }
        i += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }
    let bytes = digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect();
    (bytes, (i + 1).min(data.len()))
}

fn read_name(data: &[u8], start: usize) -> (String, usize) {
    let end = data[start..]
        .iter()
        .position(|c| c.is_ascii_whitespace() || b"/()<>[]{}%".contains(c))
        .map_or(data.len(), |p| start + p);
    (String::from_utf8_lossy(&data[start..end]).into_owned(), end)
}

/// Text strings are UTF-16BE with a BOM, UTF-8 with a BOM, or PDFDocEncoding
fn decode_text(bytes: &[u8]) -> String {
    let text = if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]));
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    } else if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(utf8).into_owned()
    } else {
        decode_latin_or_utf8(bytes)
    };
    text.trim().to_string()
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

fn skip_ws(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|c| !c.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn take_int(data: &[u8]) -> Option<(u64, &[u8])> {
    let len = data.iter().take_while(|c| c.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let value = std::str::from_utf8(&data[..len]).ok()?.parse().ok()?;
    Some((value, &data[len..]))
}
