//! Extraction Pipeline
//!
//! Per-document orchestration: split into pages, keep embedded text where it
//! is good enough, recognize the rest, and assemble page-ordered output.
//!
//! Direct text and watermark failures are absorbed. A recognition failure on
//! any page fails the whole document; no partial results are returned. The
//! scratch area is released on every exit path.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::provider::Recognizer;
use super::sidecar::{parse_sidecar_bytes, remove_extra_spaces};
use super::significance::is_significant;
use super::splitter::{PageSplitter, SplitDocument};
use super::structure::PdfStructure;
use super::text::TextExtractor;
use super::types::{ExtractionOptions, OcrError, PageContent, PageFile};
use super::watermark::WatermarkRemover;

/// Where a page's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageSource {
    Direct,
    Recognized,
}

/// Smart OCR pipeline over pluggable collaborators
#[derive(Clone)]
pub struct ExtractionPipeline {
    splitter: PageSplitter,
    text_extractor: Arc<dyn TextExtractor>,
    watermark: Arc<dyn WatermarkRemover>,
    recognizer: Arc<dyn Recognizer>,
}

impl ExtractionPipeline {
    pub fn new(
        structure: Arc<dyn PdfStructure>,
        text_extractor: Arc<dyn TextExtractor>,
        watermark: Arc<dyn WatermarkRemover>,
        recognizer: Arc<dyn Recognizer>,
    ) -> Self {
        Self {
            splitter: PageSplitter::new(structure),
            text_extractor,
            watermark,
            recognizer,
        }
    }

    /// Create scratch areas under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
        self.splitter = self.splitter.with_scratch_root(root);
        self
    }

    pub fn recognizer(&self) -> &Arc<dyn Recognizer> {
        &self.recognizer
    }

    /// Extract text from every page of `document`, in page order.
    ///
    /// Pages that yield no text are omitted from the result.
    pub async fn extract_text(
        &self,
        document: &Path,
        options: ExtractionOptions,
    ) -> Result<Vec<PageContent>, OcrError> {
        if document.as_os_str().is_empty() {
            return Err(OcrError::InvalidInput("pdf path is required".to_string()));
        }
        let options = options.normalized();
        let started = Instant::now();

        let split = self.split(document).await?;
        let result = self.process_pages(split.pages(), &options).await;

        let scratch = split.scratch_path().to_path_buf();
        if let Err(e) = split.release() {
            tracing::warn!(scratch = %scratch.display(), error = %e, "Failed to release scratch area");
        }

        let pages = result?;
        tracing::info!(
            document = %document.display(),
            pages_with_text = pages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extraction complete"
        );
        Ok(pages)
    }

    async fn split(&self, document: &Path) -> Result<SplitDocument, OcrError> {
        let splitter = self.splitter.clone();
        let document = document.to_path_buf();
        tokio::task::spawn_blocking(move || splitter.split(&document))
            .await
            .map_err(|e| OcrError::Split(format!("split task failed: {}", e)))?
    }

    async fn process_pages(
        &self,
        pages: &[PageFile],
        options: &ExtractionOptions,
    ) -> Result<Vec<PageContent>, OcrError> {
        let mut results = Vec::with_capacity(pages.len());

        for page in pages {
            let (text, source) = self.page_text(page, options).await?;
            let content = remove_extra_spaces(&text);

            if content.is_empty() {
                tracing::debug!(page = page.index, "No text on page");
                continue;
            }

            tracing::debug!(page = page.index, source = ?source, chars = content.len(), "Page extracted");
            results.push(PageContent {
                page: page.index,
                content,
            });
        }

        Ok(results)
    }

    async fn page_text(
        &self,
        page: &PageFile,
        options: &ExtractionOptions,
    ) -> Result<(String, PageSource), OcrError> {
        if options.should_remove_watermark() {
            self.remove_watermark(page).await;
        }

        if !options.force_recognition {
            let direct = self.direct_text(page).await;
            if is_significant(&direct, options.text_threshold) {
                return Ok((direct.trim().to_string(), PageSource::Direct));
            }
        }

        let sidecar = self.recognizer.recognize(page, options).await?;
        let text = parse_sidecar_bytes(sidecar.as_bytes())
            .into_iter()
            .map(|fragment| fragment.content)
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok((text, PageSource::Recognized))
    }

    async fn remove_watermark(&self, page: &PageFile) {
        let watermark = Arc::clone(&self.watermark);
        let path = page.path.clone();
        let outcome = tokio::task::spawn_blocking(move || watermark.remove_watermark(&path)).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(page = page.index, error = %e, "Watermark removal skipped"),
            Err(e) => tracing::debug!(page = page.index, error = %e, "Watermark task failed"),
        }
    }

    async fn direct_text(&self, page: &PageFile) -> String {
        match self.text_extractor.extract(&page.path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(page = page.index, error = %e, "Direct text unavailable");
                String::new()
            }
        }
    }
}
