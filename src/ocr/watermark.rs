//! Watermark Removal
//!
//! Best-effort, in-place cleanup of a single-page PDF. Removes content
//! tagged as a watermark artifact (`/Artifact <</Subtype /Watermark>> BDC ... EMC`)
//! and `/Watermark` annotations. Callers treat every failure as "leave the
//! page as it was".

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};

use super::types::OcrError;

/// In-place watermark removal for a single page artifact
pub trait WatermarkRemover: Send + Sync {
    fn remove_watermark(&self, page_path: &Path) -> Result<(), OcrError>;
}

/// lopdf-backed implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfWatermarkRemover;

impl WatermarkRemover for LopdfWatermarkRemover {
    fn remove_watermark(&self, page_path: &Path) -> Result<(), OcrError> {
        let mut doc = Document::load(page_path)
            .map_err(|e| OcrError::Watermark(format!("load {}: {}", page_path.display(), e)))?;

        let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        let mut removed = 0;
        for page_id in page_ids {
            removed += strip_page_content(&mut doc, page_id)?;
            removed += strip_page_annotations(&mut doc, page_id);
        }

        if removed == 0 {
            return Ok(());
        }

        // Write next to the page so the final rename stays on one filesystem
        let dir = page_path.parent().unwrap_or_else(|| Path::new("."));
        let staged = tempfile::Builder::new()
            .prefix("ocr-nowm-")
            .suffix(".pdf")
            .tempfile_in(dir)
            .map_err(|e| OcrError::Watermark(format!("create temp file: {}", e)))?;

        doc.save(staged.path())
            .map_err(|e| OcrError::Watermark(format!("write cleaned page: {}", e)))?;
        staged
            .persist(page_path)
            .map_err(|e| OcrError::Watermark(format!("replace original: {}", e.error)))?;

        tracing::debug!(page = %page_path.display(), removed, "Removed watermark elements");
        Ok(())
    }
}

fn strip_page_content(doc: &mut Document, page_id: ObjectId) -> Result<usize, OcrError> {
    let raw = doc
        .get_page_content(page_id)
        .map_err(|e| OcrError::Watermark(format!("read content: {}", e)))?;
    let content =
        Content::decode(&raw).map_err(|e| OcrError::Watermark(format!("decode content: {}", e)))?;

    let before = content.operations.len();
    let operations = strip_watermark_operations(content.operations);
    let removed = before - operations.len();
    if removed == 0 {
        return Ok(0);
    }

    let encoded = Content { operations }
        .encode()
        .map_err(|e| OcrError::Watermark(format!("encode content: {}", e)))?;
    doc.change_page_content(page_id, encoded)
        .map_err(|e| OcrError::Watermark(format!("write content: {}", e)))?;

    Ok(removed)
}

/// Drop every marked-content sequence tagged as a watermark artifact,
/// including anything nested inside it.
pub fn strip_watermark_operations(operations: Vec<Operation>) -> Vec<Operation> {
    let mut kept = Vec::with_capacity(operations.len());
    let mut depth = 0usize;
    let mut skip_from: Option<usize> = None;

    for op in operations {
        match op.operator.as_str() {
            "BMC" | "BDC" => {
                depth += 1;
                if skip_from.is_none() && is_watermark_artifact(&op) {
                    skip_from = Some(depth);
                }
            }
            "EMC" => {
                let closing = depth;
                depth = depth.saturating_sub(1);
                if skip_from == Some(closing) {
                    skip_from = None;
                    continue;
                }
            }
            _ => {}
        }

        if skip_from.is_none() {
            kept.push(op);
        }
    }

    kept
}

fn is_watermark_artifact(op: &Operation) -> bool {
    if op.operator != "BDC" {
        return false;
    }
    let tag_is_artifact = matches!(op.operands.first(), Some(Object::Name(tag)) if tag == b"Artifact");
    let subtype_is_watermark = match op.operands.get(1) {
        Some(Object::Dictionary(props)) => {
            matches!(props.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Watermark")
        }
        _ => false,
    };
    tag_is_artifact && subtype_is_watermark
}

fn strip_page_annotations(doc: &mut Document, page_id: ObjectId) -> usize {
    let annots = match doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
    {
        Some(Object::Array(items)) => items.clone(),
        Some(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => return 0,
        },
        _ => return 0,
    };

    let kept: Vec<Object> = annots
        .iter()
        .filter(|annot| !is_watermark_annotation(doc, annot))
        .cloned()
        .collect();
    let removed = annots.len() - kept.len();
    if removed == 0 {
        return 0;
    }

    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        page.set("Annots", Object::Array(kept));
    }
    removed
}

fn is_watermark_annotation(doc: &Document, annot: &Object) -> bool {
    let dict = match annot {
        Object::Reference(id) => match doc.get_dictionary(*id) {
            Ok(dict) => dict,
            Err(_) => return false,
        },
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Watermark")
}
