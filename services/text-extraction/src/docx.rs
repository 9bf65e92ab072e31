use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{ExtractionError, Result};

const BODY_PART: &str = "word/document.xml";

/// Paragraph text of a .docx body, one paragraph per line.
pub fn read_text(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(zip_err)?;
    let mut xml = String::new();
    archive
        .by_name(BODY_PART)
        .map_err(zip_err)?
        .read_to_string(&mut xml)?;
    let text = body_text(&xml);
    info!(path = %path.display(), chars = text.chars().count(), "docx text read");
    Ok(text)
}

fn zip_err(e: ZipError) -> ExtractionError {
    match e {
        ZipError::Io(io) => ExtractionError::Io(io.to_string()),
        other => ExtractionError::Codec(other.to_string()),
    }
}

/// Collects the contents of `<w:t>` runs; `</w:p>` ends a line and `<w:tab/>`
/// becomes a tab. Everything else in the markup is skipped.
pub(crate) fn body_text(xml: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;
    let mut in_run = false;
    while let Some(open) = rest.find('<') {
        if in_run {
            out.push_str(&unescape(&rest[..open]));
        }
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = &rest[open + 1..open + close];
        let name = tag
            .split(|c: char| c.is_whitespace() || c == '/')
            .find(|s| !s.is_empty())
            .unwrap_or("");
        let self_closing = tag.ends_with('/');
        if tag.starts_with('/') {
            match name {
                "w:t" => in_run = false,
                "w:p" => out.push('\n'),
                _ => {}
            }
        } else {
            match name {
                "w:t" => in_run = !self_closing,
                "w:tab" => out.push('\t'),
                "w:br" => out.push('\n'),
                _ => {}
            }
        }
        rest = &rest[open + close + 1..];
    }
    out
}

fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
