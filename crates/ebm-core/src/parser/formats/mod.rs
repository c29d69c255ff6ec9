// Format-specific metadata readers
pub mod epub;
pub mod mobi;
pub mod pdf;

/// Decode bytes that are either UTF-8 or a single-byte Latin encoding
pub(crate) fn decode_latin_or_utf8(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Split a `/`-separated field into trimmed, non-empty parts
pub(crate) fn split_field(value: &str) -> Vec<String> {
    value
        .split('/')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
