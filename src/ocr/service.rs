//! OCR Service
//!
//! Ties upload intake to the extraction pipeline and builds the production
//! collaborators from configuration.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use tokio::sync::Mutex;

use super::pipeline::ExtractionPipeline;
use super::provider::OcrMyPdf;
use super::structure::LopdfStructure;
use super::text::PdfToText;
use super::types::{ExtractionOptions, OcrError, PageContent, DEFAULT_TEXT_THRESHOLD};
use super::upload::{save_upload, UploadedFile};
use super::watermark::LopdfWatermarkRemover;

/// OCR service configuration
#[derive(Debug, Clone)]
pub struct OcrServiceConfig {
    /// Recognition binary
    pub binary: String,
    /// Per-page recognition deadline
    pub timeout: Duration,
    /// Direct text extractor binary
    pub pdftotext_binary: String,
    /// Direct text deadline
    pub text_timeout: Duration,
    /// Language used when a request has none
    pub default_language: String,
    /// Threshold used when a request has none
    pub text_threshold: i64,
    /// Root for scratch areas and uploads (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for OcrServiceConfig {
    fn default() -> Self {
        Self {
            binary: super::provider::DEFAULT_BINARY.to_string(),
            timeout: super::provider::DEFAULT_TIMEOUT,
            pdftotext_binary: "pdftotext".to_string(),
            text_timeout: Duration::from_secs(30),
            default_language: "eng+chi_sim+ind".to_string(),
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            scratch_dir: None,
        }
    }
}

/// Per-request overrides, as received from a client
#[derive(Debug, Clone, Default)]
pub struct OcrRequest {
    pub language: Option<String>,
    pub text_threshold: Option<i64>,
    pub force_ocr: bool,
    pub remove_watermark: Option<bool>,
}

/// How long an engine availability result is reused
pub const AVAILABILITY_TTL: Duration = Duration::from_secs(30);

/// OCR service shared by all requests
#[derive(Clone)]
pub struct OcrService {
    config: Arc<OcrServiceConfig>,
    pipeline: Arc<ExtractionPipeline>,
    availability: Arc<Mutex<Option<(Instant, bool)>>>,
}

impl OcrService {
    /// Create a service backed by OCRmyPDF, pdftotext and lopdf
    pub fn new(config: OcrServiceConfig) -> Self {
        let mut pipeline = ExtractionPipeline::new(
            Arc::new(LopdfStructure),
            Arc::new(PdfToText::new(&config.pdftotext_binary, config.text_timeout)),
            Arc::new(LopdfWatermarkRemover),
            Arc::new(OcrMyPdf::new(&config.binary, config.timeout)),
        );
        if let Some(dir) = &config.scratch_dir {
            pipeline = pipeline.with_scratch_root(dir);
        }
        Self::with_pipeline(config, pipeline)
    }

    /// Create a service around an already-built pipeline
    pub fn with_pipeline(config: OcrServiceConfig, pipeline: ExtractionPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            availability: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &OcrServiceConfig {
        &self.config
    }

    /// Whether the recognition engine can currently be invoked.
    ///
    /// The engine is probed at most once per [`AVAILABILITY_TTL`]; callers
    /// arriving during a probe wait for its result.
    pub async fn is_available(&self) -> bool {
        let mut cached = self.availability.lock().await;
        if let Some((checked_at, available)) = *cached {
            if checked_at.elapsed() < AVAILABILITY_TTL {
                return available;
            }
        }

        let available = self.pipeline.recognizer().is_available().await;
        *cached = Some((Instant::now(), available));
        available
    }

    /// Seed the availability cache from a check made elsewhere (startup)
    pub async fn record_availability(&self, available: bool) {
        *self.availability.lock().await = Some((Instant::now(), available));
    }

    /// Resolve request overrides against configured defaults
    pub fn options_for(&self, request: &OcrRequest) -> ExtractionOptions {
        let language = request
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.config.default_language)
            .to_string();

        ExtractionOptions {
            language: Some(language),
            text_threshold: request.text_threshold.unwrap_or(self.config.text_threshold),
            force_recognition: request.force_ocr,
            remove_watermark: request.remove_watermark.unwrap_or(true),
        }
    }

    /// Persist an uploaded PDF into the scratch root
    pub async fn save_upload<S, B, E>(&self, stream: S) -> Result<UploadedFile, OcrError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        save_upload(stream, self.config.scratch_dir.as_deref()).await
    }

    /// Run the pipeline over a persisted upload, then release it
    pub async fn process(
        &self,
        upload: UploadedFile,
        request: &OcrRequest,
    ) -> Result<Vec<PageContent>, OcrError> {
        let options = self.options_for(request);

        tracing::info!(
            path = %upload.path().display(),
            size = upload.size(),
            language = options.language.as_deref().unwrap_or(""),
            force_ocr = options.force_recognition,
            "Processing PDF"
        );

        let result = self.pipeline.extract_text(upload.path(), options).await;

        if let Err(e) = upload.release() {
            tracing::warn!(error = %e, "Failed to remove uploaded file");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::provider::Recognizer;
    use crate::ocr::types::PageFile;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts availability probes
    #[derive(Default)]
    struct CountingRecognizer {
        probes: AtomicUsize,
    }

    #[async_trait]
    impl Recognizer for CountingRecognizer {
        fn name(&self) -> &str {
            "counting"
        }

        async fn is_available(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn recognize(
            &self,
            _page: &PageFile,
            _options: &ExtractionOptions,
        ) -> Result<String, OcrError> {
            Ok(String::new())
        }
    }

    fn counting_service() -> (OcrService, Arc<CountingRecognizer>) {
        let recognizer = Arc::new(CountingRecognizer::default());
        let pipeline = ExtractionPipeline::new(
            Arc::new(LopdfStructure),
            Arc::new(PdfToText::default()),
            Arc::new(LopdfWatermarkRemover),
            recognizer.clone(),
        );
        (
            OcrService::with_pipeline(OcrServiceConfig::default(), pipeline),
            recognizer,
        )
    }

    #[tokio::test]
    async fn test_availability_probe_is_cached() {
        let (service, recognizer) = counting_service();

        assert!(service.is_available().await);
        assert!(service.is_available().await);
        assert!(service.clone().is_available().await);

        assert_eq!(recognizer.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recorded_availability_skips_probe() {
        let (service, recognizer) = counting_service();

        service.record_availability(true).await;

        assert!(service.is_available().await);
        assert_eq!(recognizer.probes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_options_use_configured_defaults() {
        let service = OcrService::new(OcrServiceConfig::default());
        let opts = service.options_for(&OcrRequest::default());

        assert_eq!(opts.language.as_deref(), Some("eng+chi_sim+ind"));
        assert_eq!(opts.text_threshold, DEFAULT_TEXT_THRESHOLD);
        assert!(!opts.force_recognition);
        assert!(opts.remove_watermark);
    }

    #[test]
    fn test_request_overrides() {
        let service = OcrService::new(OcrServiceConfig::default());
        let opts = service.options_for(&OcrRequest {
            language: Some(" deu ".into()),
            text_threshold: Some(20),
            force_ocr: true,
            remove_watermark: Some(false),
        });

        assert_eq!(opts.language.as_deref(), Some("deu"));
        assert_eq!(opts.text_threshold, 20);
        assert!(opts.force_recognition);
        assert!(!opts.remove_watermark);
    }

    #[test]
    fn test_blank_language_falls_back() {
        let service = OcrService::new(OcrServiceConfig::default());
        let opts = service.options_for(&OcrRequest {
            language: Some("".into()),
            ..Default::default()
        });
        assert_eq!(opts.language.as_deref(), Some("eng+chi_sim+ind"));
    }

    #[tokio::test]
    async fn test_process_releases_upload_on_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let service = OcrService::new(OcrServiceConfig {
            scratch_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        });

        let chunks: Vec<Result<&[u8], std::io::Error>> = vec![Ok(&b"not a pdf"[..])];
        let upload = service.save_upload(futures::stream::iter(chunks)).await.unwrap();
        let path = upload.path().to_path_buf();

        let result = service.process(upload, &OcrRequest::default()).await;

        assert!(matches!(result, Err(OcrError::Split(_))));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
