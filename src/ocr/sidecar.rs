//! Sidecar Parsing
//!
//! OCRmyPDF writes recognized text to a sidecar file with one form-feed
//! delimited chunk per attempted page. Chunks that come back empty still
//! occupy a page slot, so page numbers are assigned by chunk position and
//! not by emitted record.

use std::path::Path;

use super::types::{OcrError, PageContent};

/// Page delimiter in sidecar output
pub const PAGE_SEPARATOR: char = '\u{000C}';

/// Parse a sidecar file from disk
pub async fn parse_sidecar(path: &Path) -> Result<Vec<PageContent>, OcrError> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        OcrError::Sidecar(format!("read {}: {}", path.display(), e))
    })?;
    Ok(parse_sidecar_bytes(&data))
}

/// Parse raw sidecar bytes into numbered page records
pub fn parse_sidecar_bytes(data: &[u8]) -> Vec<PageContent> {
    let raw = String::from_utf8_lossy(data);

    raw.split(PAGE_SEPARATOR)
        .enumerate()
        .filter_map(|(chunk_index, chunk)| {
            let text = normalize_newlines(chunk);
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(PageContent {
                page: chunk_index + 1,
                content: text.to_string(),
            })
        })
        .collect()
}

/// Convert CRLF line endings to LF
pub fn normalize_newlines(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Collapse runs of spaces and tabs inside each line and drop trailing blanks.
///
/// `pdftotext -layout` pads columns with long space runs; line structure is
/// kept as-is.
pub fn remove_extra_spaces(input: &str) -> String {
    input
        .lines()
        .map(|line| line.split([' ', '\t']).filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
