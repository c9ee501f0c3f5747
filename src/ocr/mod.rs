//! OCR Module
//!
//! Smart text extraction for scanned and partially scanned PDFs.
//!
//! Each document is split into single-page PDFs. Pages that already carry a
//! usable text layer keep it; the rest go through OCRmyPDF one page at a
//! time. Results come back in page order, with empty pages left out.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdf_ocr_server::ocr::{ExtractionOptions, OcrService, OcrServiceConfig};
//!
//! let service = OcrService::new(OcrServiceConfig::default());
//! let upload = service.save_upload(body_stream).await?;
//! let pages = service.process(upload, &Default::default()).await?;
//!
//! for page in pages {
//!     println!("{}: {}", page.page, page.content);
//! }
//! ```

mod pipeline;
mod provider;
mod service;
mod sidecar;
mod significance;
mod splitter;
mod structure;
mod text;
mod types;
mod upload;
mod watermark;

pub use pipeline::ExtractionPipeline;
pub use provider::{ensure_binary, OcrMyPdf, Recognizer, DEFAULT_BINARY, DEFAULT_TIMEOUT};
pub use service::{OcrRequest, OcrService, OcrServiceConfig, AVAILABILITY_TTL};
pub use sidecar::{normalize_newlines, parse_sidecar, parse_sidecar_bytes, remove_extra_spaces};
pub use significance::is_significant;
pub use splitter::{PageSplitter, SplitDocument};
pub use structure::{LopdfStructure, PdfStructure};
pub use text::{PdfToText, TextExtractor};
pub use types::{ExtractionOptions, OcrError, PageContent, PageFile, DEFAULT_TEXT_THRESHOLD};
pub use upload::{save_upload, UploadedFile};
pub use watermark::{LopdfWatermarkRemover, WatermarkRemover};
