//! Recognition Providers
//!
//! Defines the recognizer trait and the OCRmyPDF implementation that runs
//! the engine as a child process, one page at a time.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::sidecar::normalize_newlines;
use super::types::{ExtractionOptions, OcrError, PageFile};

/// Default recognition binary
pub const DEFAULT_BINARY: &str = "ocrmypdf";

/// Default per-page recognition deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Deadline for the `--version` availability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long to wait for stderr to close once the engine has exited
const STDERR_DRAIN: Duration = Duration::from_millis(500);

/// Recognition engine trait
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Check if the engine can be invoked
    async fn is_available(&self) -> bool;

    /// Recognize a single page and return its sidecar text, newline
    /// normalized and trimmed.
    async fn recognize(&self, page: &PageFile, options: &ExtractionOptions) -> Result<String, OcrError>;
}

/// OCRmyPDF command-line provider
#[derive(Debug, Clone)]
pub struct OcrMyPdf {
    binary: String,
    timeout: Duration,
}

impl Default for OcrMyPdf {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY, DEFAULT_TIMEOUT)
    }
}

impl OcrMyPdf {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        let binary = binary.into();
        Self {
            binary: if binary.is_empty() {
                DEFAULT_BINARY.to_string()
            } else {
                binary
            },
            timeout: if timeout.is_zero() {
                DEFAULT_TIMEOUT
            } else {
                timeout
            },
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Engine arguments for one page.
    ///
    /// Recognition is always forced: the pipeline has already decided the
    /// page's embedded text is not good enough.
    pub fn build_args(
        sidecar: &Path,
        language: Option<&str>,
        input: &Path,
        output: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--sidecar".into(),
            sidecar.into(),
            "--quiet".into(),
            "--rotate-pages-threshold".into(),
            "0.0".into(),
            "--force-ocr".into(),
        ];
        if let Some(lang) = language.filter(|l| !l.is_empty()) {
            args.push("--language".into());
            args.push(lang.into());
        }
        args.push(input.into());
        args.push(output.into());
        args
    }
}

#[async_trait]
impl Recognizer for OcrMyPdf {
    fn name(&self) -> &str {
        &self.binary
    }

    async fn is_available(&self) -> bool {
        ensure_binary(&self.binary).await.is_ok()
    }

    async fn recognize(&self, page: &PageFile, options: &ExtractionOptions) -> Result<String, OcrError> {
        let work_dir = page.path.parent().unwrap_or_else(|| Path::new("."));
        let sidecar = temp_file(work_dir, "ocr-sidecar-", ".txt", page.index)?;
        let output_pdf = temp_file(work_dir, "ocr-output-", ".pdf", page.index)?;

        let args = Self::build_args(
            sidecar.path(),
            options.language.as_deref(),
            &page.path,
            output_pdf.path(),
        );

        tracing::debug!(
            page = page.index,
            binary = %self.binary,
            language = options.language.as_deref().unwrap_or(""),
            "Running recognition"
        );

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcrError::recognition(page.index, format!("spawn {}: {}", self.binary, e)))?;
        let stderr = StderrCapture::start(child.stderr.take());

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(result) => result.map_err(|e| {
                OcrError::recognition(page.index, format!("{}: {}", self.binary, e))
            })?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::debug!(page = page.index, error = %e, "Failed to kill recognition process");
                }
                let stderr = stderr.finish().await;
                tracing::warn!(page = page.index, timeout = ?self.timeout, "Recognition timed out");
                return Err(OcrError::recognition(
                    page.index,
                    with_stderr(
                        format!("{} timed out after {:?}", self.binary, self.timeout),
                        &stderr,
                    ),
                ));
            }
        };

        let stderr = stderr.finish().await;
        if !status.success() {
            return Err(OcrError::recognition(
                page.index,
                with_stderr(format!("{} exited with {}", self.binary, status), &stderr),
            ));
        }

        let data = tokio::fs::read(sidecar.path())
            .await
            .map_err(|e| OcrError::recognition(page.index, format!("read sidecar: {}", e)))?;

        Ok(normalize_newlines(&String::from_utf8_lossy(&data))
            .trim()
            .to_string())
    }
}

/// Engine diagnostics collected while the process runs, so a killed
/// process still reports what it wrote before the deadline.
struct StderrCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl StderrCapture {
    fn start(pipe: Option<ChildStderr>) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reader = pipe.map(|mut pipe| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buffer.lock().await.extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buffer, reader }
    }

    /// Give the pipe a moment to drain, then return what was captured.
    ///
    /// Grandchildren of a killed engine can hold the pipe open, so the
    /// reader is abandoned after `STDERR_DRAIN`.
    async fn finish(mut self) -> String {
        if let Some(mut reader) = self.reader.take() {
            if tokio::time::timeout(STDERR_DRAIN, &mut reader).await.is_err() {
                reader.abort();
            }
        }
        let data = self.buffer.lock().await;
        let text = String::from_utf8_lossy(&data).trim().to_string();
        text
    }
}

impl Drop for StderrCapture {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

fn with_stderr(message: String, stderr: &str) -> String {
    if stderr.is_empty() {
        message
    } else {
        format!("{} - {}", message, stderr)
    }
}

fn temp_file(dir: &Path, prefix: &str, suffix: &str, page: usize) -> Result<NamedTempFile, OcrError> {
    tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|e| OcrError::recognition(page, format!("create {}* file: {}", prefix, e)))
}

/// Check that `binary` can be spawned and answers `--version`
pub async fn ensure_binary(binary: &str) -> Result<(), OcrError> {
    let binary = if binary.is_empty() { DEFAULT_BINARY } else { binary };
    let not_found = |reason: String| OcrError::BinaryNotFound {
        binary: binary.to_string(),
        reason,
    };

    let child = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| not_found(e.to_string()))?;

    let status = tokio::time::timeout(PROBE_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| not_found("version probe timed out".to_string()))?
        .map_err(|e| not_found(e.to_string()))?
        .status;

    if status.success() {
        Ok(())
    } else {
        Err(not_found(format!("version probe exited with {}", status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn options(language: Option<&str>) -> ExtractionOptions {
        ExtractionOptions {
            language: language.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_args_with_language() {
        let args = OcrMyPdf::build_args(
            Path::new("/s/side.txt"),
            Some("eng+deu"),
            Path::new("/s/page_0001.pdf"),
            Path::new("/s/out.pdf"),
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "--sidecar",
                "/s/side.txt",
                "--quiet",
                "--rotate-pages-threshold",
                "0.0",
                "--force-ocr",
                "--language",
                "eng+deu",
                "/s/page_0001.pdf",
                "/s/out.pdf",
            ]
        );
    }

    #[test]
    fn test_build_args_without_language() {
        let args = OcrMyPdf::build_args(
            Path::new("side.txt"),
            None,
            Path::new("in.pdf"),
            Path::new("out.pdf"),
        );
        assert!(!args.iter().any(|a| a == "--language"));
        assert_eq!(args.len(), 8);
        assert_eq!(args.last().unwrap(), "out.pdf");
    }

    #[test]
    fn test_defaults_for_empty_settings() {
        let provider = OcrMyPdf::new("", Duration::ZERO);
        assert_eq!(provider.binary(), DEFAULT_BINARY);
        assert_eq!(provider.timeout(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_ensure_binary_missing() {
        let result = ensure_binary("ocrmypdf-definitely-missing").await;
        assert!(matches!(result, Err(OcrError::BinaryNotFound { .. })));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_recognition_with_page() {
        let dir = TempDir::new().unwrap();
        let page = PageFile {
            index: 4,
            path: dir.path().join("page_0004.pdf"),
        };
        let provider = OcrMyPdf::new("ocrmypdf-definitely-missing", Duration::from_secs(1));

        match provider.recognize(&page, &options(None)).await {
            Err(OcrError::Recognition { page, .. }) => assert_eq!(page, 4),
            other => panic!("expected recognition error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    mod scripted {
        //! Drive `recognize` against small shell scripts standing in for the engine.

        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-ocrmypdf");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn page_in(dir: &Path) -> PageFile {
            let path = dir.join("page_0002.pdf");
            std::fs::write(&path, b"%PDF-1.5").unwrap();
            PageFile { index: 2, path }
        }

        fn leftover_temp_files(dir: &Path) -> usize {
            std::fs::read_dir(dir)
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with("ocr-"))
                .count()
        }

        #[tokio::test]
        async fn test_reads_and_normalizes_sidecar() {
            let bin = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            // $2 is the sidecar path
            let engine = script(bin.path(), r#"printf '  Scanned line\r\nNext line\f' > "$2""#);
            let provider = OcrMyPdf::new(engine.to_string_lossy(), Duration::from_secs(10));

            let text = provider
                .recognize(&page_in(work.path()), &options(Some("eng")))
                .await
                .unwrap();

            assert_eq!(text, "Scanned line\nNext line");
            assert_eq!(leftover_temp_files(work.path()), 0);
        }

        #[tokio::test]
        async fn test_non_zero_exit_carries_stderr() {
            let bin = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            let engine = script(bin.path(), "echo 'tesseract: language not installed' >&2\nexit 3");
            let provider = OcrMyPdf::new(engine.to_string_lossy(), Duration::from_secs(10));

            let err = provider
                .recognize(&page_in(work.path()), &options(Some("xyz")))
                .await
                .unwrap_err();

            match err {
                OcrError::Recognition { page, message } => {
                    assert_eq!(page, 2);
                    assert!(message.contains("language not installed"), "{}", message);
                }
                other => panic!("expected recognition error, got {:?}", other),
            }
            assert_eq!(leftover_temp_files(work.path()), 0);
        }

        #[tokio::test]
        async fn test_timeout_is_a_recognition_error() {
            let bin = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            let engine = script(bin.path(), "sleep 30");
            let provider = OcrMyPdf::new(engine.to_string_lossy(), Duration::from_millis(200));

            let started = std::time::Instant::now();
            let err = provider
                .recognize(&page_in(work.path()), &options(None))
                .await
                .unwrap_err();

            assert!(started.elapsed() < Duration::from_secs(10));
            assert!(matches!(err, OcrError::Recognition { page: 2, .. }));
            assert!(err.to_string().contains("timed out"));
        }

        #[tokio::test]
        async fn test_timeout_keeps_partial_stderr() {
            let bin = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            let engine = script(
                bin.path(),
                "echo 'tesseract: page 1 stalled on layout analysis' >&2\nsleep 30",
            );
            let provider = OcrMyPdf::new(engine.to_string_lossy(), Duration::from_millis(500));

            let started = std::time::Instant::now();
            let err = provider
                .recognize(&page_in(work.path()), &options(None))
                .await
                .unwrap_err();

            assert!(started.elapsed() < Duration::from_secs(10));
            match err {
                OcrError::Recognition { page, message } => {
                    assert_eq!(page, 2);
                    assert!(message.contains("timed out"), "{}", message);
                    assert!(message.contains("stalled on layout"), "{}", message);
                }
                other => panic!("expected recognition error, got {:?}", other),
            }
            assert_eq!(leftover_temp_files(work.path()), 0);
        }

        #[tokio::test]
        async fn test_missing_sidecar_is_an_error() {
            let bin = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            let engine = script(bin.path(), r#"rm -f "$2""#);
            let provider = OcrMyPdf::new(engine.to_string_lossy(), Duration::from_secs(10));

            let err = provider
                .recognize(&page_in(work.path()), &options(None))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("read sidecar"), "{}", err);
        }
    }
}
