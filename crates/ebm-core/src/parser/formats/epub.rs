//! EPUB metadata: `META-INF/container.xml` points at the OPF package
//! document, whose Dublin Core elements carry the bibliographic fields.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::parser::Metadata;

const CONTAINER_PATH: &str = "META-INF/container.xml";
const EPUB_MIMETYPE: &str = "application/epub+zip";

pub fn read_metadata(path: &Path) -> Result<Metadata> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::metadata(path, format!("damaged archive: {}", e)))?;

    let container = read_entry(&mut archive, CONTAINER_PATH)
        .map_err(|e| Error::metadata(path, format!("cannot read {}: {}", CONTAINER_PATH, e)))?;

    let Some(container) = container else {
        // A plain ZIP that merely shares the magic bytes is not an e-book
        if has_epub_mimetype(&mut archive) {
            return Err(Error::metadata(path, format!("missing {}", CONTAINER_PATH)));
        }
        return Err(Error::UnsupportedFormat(path.to_path_buf()));
    };

    let package_path = rootfile_path(&container)
        .map_err(|e| Error::metadata(path, format!("invalid {}: {}", CONTAINER_PATH, e)))?
        .ok_or_else(|| Error::metadata(path, "container lists no rootfile"))?;

    let package = read_entry(&mut archive, &package_path)
        .map_err(|e| Error::metadata(path, format!("cannot read {}: {}", package_path, e)))?
        .ok_or_else(|| {
            Error::metadata(path, format!("missing package document {}", package_path))
        })?;

    parse_package(&package)
        .map_err(|e| Error::metadata(path, format!("invalid {}: {}", package_path, e)))
}

/// Entry contents as text, `None` if the archive has no such entry
fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> std::result::Result<Option<String>, ZipError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
}

fn has_epub_mimetype<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> bool {
    matches!(read_entry(archive, "mimetype"), Ok(Some(m)) if m.trim() == EPUB_MIMETYPE)
}

/// `full-path` of the first OPF rootfile in container.xml
fn rootfile_path(container: &str) -> std::result::Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(container);
    reader.config_mut().trim_text(true);

    let mut fallback = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"rootfile" => {
                let full_path = attribute(&e, b"full-path")?;
                let media_type = attribute(&e, b"media-type")?;
                match (full_path, media_type.as_deref()) {
                    (Some(p), Some("application/oebps-package+xml")) => return Ok(Some(p)),
                    (Some(p), _) if fallback.is_none() => fallback = Some(p),
                    _ => {}
                }
            }
            Event::Eof => return Ok(fallback),
            _ => {}
        }
    }
}

fn attribute(
    element: &BytesStart<'_>,
    name: &[u8],
) -> std::result::Result<Option<String>, quick_xml::Error> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Creator,
    Publisher,
    Subject,
    Identifier,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"creator" => Some(Field::Creator),
            b"publisher" => Some(Field::Publisher),
            b"subject" => Some(Field::Subject),
            b"identifier" => Some(Field::Identifier),
            _ => None,
        }
    }
}

/// Dublin Core fields inside the OPF `<metadata>` element
fn parse_package(package: &str) -> std::result::Result<Metadata, quick_xml::Error> {
    let mut reader = Reader::from_str(package);
    reader.config_mut().trim_text(true);

    let mut metadata = Metadata::default();
    let mut identifiers: Vec<(String, bool)> = Vec::new();
    let mut in_metadata = false;
    let mut current: Option<(Field, bool)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name();
                if name.as_ref() == b"metadata" {
                    in_metadata = true;
                } else if in_metadata {
                    if let Some(field) = Field::from_local_name(name.as_ref()) {
                        let isbn_scheme = attribute(&e, b"scheme")?
                            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("isbn"));
                        current = Some((field, isbn_scheme));
                        text.clear();
                    }
                }
            }
            // <dc:creator/> still names an author, just not a known one
            Event::Empty(e) if in_metadata => {
                if Field::from_local_name(e.local_name().as_ref()) == Some(Field::Creator) {
                    metadata.authors.push("Unknown".to_string());
                }
            }
            Event::Text(e) if current.is_some() => text.push_str(&e.unescape()?),
            Event::CData(e) if current.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()))
            }
            Event::End(e) => {
                let name = e.local_name();
                if name.as_ref() == b"metadata" {
                    break;
                }
                if let Some((field, isbn_scheme)) = current.take() {
                    let value = text.trim().to_string();
                    match field {
                        Field::Title if metadata.title.is_empty() => metadata.title = value,
                        Field::Creator if value.is_empty() => {
                            metadata.authors.push("Unknown".to_string())
                        }
                        Field::Creator => metadata.authors.push(value),
                        Field::Publisher if metadata.publisher.is_empty() => {
                            metadata.publisher = value
                        }
                        Field::Subject if !value.is_empty() => metadata.tags.push(value),
                        Field::Identifier if !value.is_empty() => {
                            identifiers.push((value, isbn_scheme))
                        }
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    metadata.isbn = pick_isbn(identifiers);
    Ok(metadata)
}

/// Prefer an identifier marked as an ISBN, else the first one
fn pick_isbn(identifiers: Vec<(String, bool)>) -> String {
    const URN_PREFIX: &str = "urn:isbn:";

    let marked = identifiers.iter().find_map(|(value, isbn_scheme)| {
        let has_urn_prefix = value
            .get(..URN_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(URN_PREFIX));
        if has_urn_prefix && value.len() > URN_PREFIX.len() {
            Some(value[URN_PREFIX.len()..].to_string())
        } else if *isbn_scheme {
            Some(value.clone())
        } else {
            None
        }
    });

    marked
        .or_else(|| identifiers.into_iter().next().map(|(value, _)| value))
        .unwrap_or_default()
}
