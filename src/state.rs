//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::ocr::OcrService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    ocr: OcrService,
}

impl AppState {
    /// Create state with the production OCR service
    pub fn new(config: Config) -> Self {
        let ocr = OcrService::new(config.ocr.clone());
        Self::with_service(config, ocr)
    }

    /// Create state around an existing OCR service
    pub fn with_service(config: Config, ocr: OcrService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, ocr }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the OCR service
    pub fn ocr(&self) -> &OcrService {
        &self.inner.ocr
    }
}
