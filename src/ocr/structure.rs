//! Structural PDF access
//!
//! Page counting and single-page extraction, backed by lopdf.

use std::path::Path;

use lopdf::Document;

use super::types::OcrError;

/// Structural operations the page splitter needs from a PDF library
pub trait PdfStructure: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self, path: &Path) -> Result<usize, OcrError>;

    /// Write page `index` (1-indexed) of `path` as a single-page PDF into
    /// `out_dir`, named `{stem}_page_{index}.pdf` or `{stem}_{index}.pdf`.
    fn extract_page(&self, path: &Path, index: usize, out_dir: &Path) -> Result<(), OcrError>;
}

/// lopdf-backed implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfStructure;

impl LopdfStructure {
    fn load(path: &Path) -> Result<Document, OcrError> {
        Document::load(path)
            .map_err(|e| OcrError::Split(format!("load {}: {}", path.display(), e)))
    }
}

impl PdfStructure for LopdfStructure {
    fn page_count(&self, path: &Path) -> Result<usize, OcrError> {
        let doc = Self::load(path)?;
        Ok(doc.get_pages().len())
    }

    fn extract_page(&self, path: &Path, index: usize, out_dir: &Path) -> Result<(), OcrError> {
        let mut doc = Self::load(path)?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if !page_numbers.contains(&(index as u32)) {
            return Err(OcrError::Split(format!(
                "page {} out of range (document has {} pages)",
                index,
                page_numbers.len()
            )));
        }

        let others: Vec<u32> = page_numbers
            .into_iter()
            .filter(|&n| n != index as u32)
            .collect();
        doc.delete_pages(&others);
        doc.prune_objects();

        let target = out_dir.join(format!("{}_page_{}.pdf", file_stem(path), index));
        doc.save(&target)
            .map_err(|e| OcrError::Split(format!("write page {}: {}", index, e)))?;

        Ok(())
    }
}

/// Source file name without its `.pdf` extension
pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(".pdf").map(str::to_string).unwrap_or(name)
}
