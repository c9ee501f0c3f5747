//! Page Splitter
//!
//! Breaks a document into single-page PDFs inside a private scratch area.
//! The scratch area is a [`TempDir`]: whoever holds the [`SplitDocument`]
//! owns every page artifact, and dropping it removes them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use super::structure::{file_stem, PdfStructure};
use super::types::{OcrError, PageFile};

/// Prefix for per-call scratch directories
const SCRATCH_PREFIX: &str = "ocr-pages-";

/// Pages of one document plus the scratch area holding them
#[derive(Debug)]
pub struct SplitDocument {
    scratch: TempDir,
    pages: Vec<PageFile>,
}

impl SplitDocument {
    /// Page artifacts in page order
    pub fn pages(&self) -> &[PageFile] {
        &self.pages
    }

    /// Scratch directory holding the page artifacts
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Delete the scratch area and everything in it
    pub fn release(self) -> std::io::Result<()> {
        self.scratch.close()
    }
}

/// Splits documents via a structural PDF collaborator
#[derive(Clone)]
pub struct PageSplitter {
    structure: Arc<dyn PdfStructure>,
    scratch_root: Option<PathBuf>,
}

impl PageSplitter {
    pub fn new(structure: Arc<dyn PdfStructure>) -> Self {
        Self {
            structure,
            scratch_root: None,
        }
    }

    /// Create scratch areas under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Split `document` into one PDF per page.
    ///
    /// On any failure the partially filled scratch area is removed before
    /// the error is returned.
    pub fn split(&self, document: &Path) -> Result<SplitDocument, OcrError> {
        let scratch = self.create_scratch()?;

        let page_count = self
            .structure
            .page_count(document)
            .map_err(|e| split_context("get page count", e))?;

        tracing::debug!(
            document = %document.display(),
            page_count,
            scratch = %scratch.path().display(),
            "Splitting document"
        );

        let stem = file_stem(document);
        let mut pages = Vec::with_capacity(page_count);

        for index in 1..=page_count {
            self.structure
                .extract_page(document, index, scratch.path())
                .map_err(|e| split_context(&format!("extract page {}", index), e))?;

            let path = locate_page(scratch.path(), &stem, index)?;
            pages.push(PageFile { index, path });
        }

        Ok(SplitDocument { scratch, pages })
    }

    fn create_scratch(&self) -> Result<TempDir, OcrError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);

        let scratch = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        scratch.map_err(|e| OcrError::Split(format!("create scratch dir: {}", e)))
    }
}

fn split_context(context: &str, err: OcrError) -> OcrError {
    match err {
        OcrError::Split(msg) => OcrError::Split(format!("{}: {}", context, msg)),
        other => OcrError::Split(format!("{}: {}", context, other)),
    }
}

/// Find the artifact the structural collaborator wrote for page `index` and
/// move it to its canonical `page_NNNN.pdf` name.
fn locate_page(scratch: &Path, stem: &str, index: usize) -> Result<PathBuf, OcrError> {
    let canonical = scratch.join(format!("page_{:04}.pdf", index));
    let candidates = [
        scratch.join(format!("{}_page_{}.pdf", stem, index)),
        scratch.join(format!("{}_{}.pdf", stem, index)),
    ];

    let found = candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| OcrError::Split(format!("find extracted page {} file", index)))?;

    std::fs::rename(found, &canonical)
        .map_err(|e| OcrError::Split(format!("rename page {}: {}", index, e)))?;

    Ok(canonical)
}
