use std::path::Path;

use tracing::{debug, info};

use crate::error::Result;

/// Reads a plain-text file. UTF-8 (with or without BOM) is tried first, then
/// UTF-16 with a byte-order mark, then Latin-1, which never fails.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let text = decode(&bytes);
    info!(path = %path.display(), chars = text.chars().count(), "text file read");
    Ok(text)
}

pub(crate) fn decode(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    if let Ok(s) = std::str::from_utf8(body) {
        return s.to_string();
    }
    if let Some(s) = decode_utf16(bytes) {
        debug!("decoded as utf-16");
        return s;
    }
    debug!("decoded as latin-1");
    bytes.iter().map(|&b| b as char).collect()
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    let (body, little_endian) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (rest, true),
        [0xFE, 0xFF, rest @ ..] => (rest, false),
        _ => return None,
    };
    if body.len() % 2 != 0 {
        return None;
    }
    let units = body.chunks_exact(2).map(|pair| {
        if little_endian {
            u16::from_le_bytes([pair[0], pair[1]])
        } else {
            u16::from_be_bytes([pair[0], pair[1]])
        }
    });
    char::decode_utf16(units).collect::<std::result::Result<String, _>>().ok()
}
