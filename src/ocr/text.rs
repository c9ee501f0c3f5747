//! Direct text retrieval
//!
//! Reads the text layer already embedded in a page. Used to decide whether
//! a page needs recognition at all; failures are never fatal.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::sidecar::normalize_newlines;
use super::types::OcrError;

/// Embedded-text extraction for a single page artifact
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, page_path: &Path) -> Result<String, OcrError>;
}

/// `pdftotext` (poppler-utils) in layout mode
#[derive(Debug, Clone)]
pub struct PdfToText {
    binary: String,
    timeout: Duration,
}

impl Default for PdfToText {
    fn default() -> Self {
        Self::new("pdftotext", Duration::from_secs(30))
    }
}

impl PdfToText {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TextExtractor for PdfToText {
    async fn extract(&self, page_path: &Path) -> Result<String, OcrError> {
        let child = Command::new(&self.binary)
            .arg("-layout")
            .arg(page_path)
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcrError::TextExtraction(format!("spawn {}: {}", self.binary, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                OcrError::TextExtraction(format!("{} timed out after {:?}", self.binary, self.timeout))
            })?
            .map_err(|e| OcrError::TextExtraction(format!("{}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(OcrError::TextExtraction(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(normalize_newlines(&String::from_utf8_lossy(&output.stdout)))
    }
}
