//! Configuration management for the OCR server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ocr::OcrServiceConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrServiceConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Required `x-api-key` value for OCR routes; open when unset
    pub api_key: Option<String>,
    /// Multipart body limit in bytes
    pub max_upload_bytes: usize,
    /// Deadline for a whole OCR request, upload included
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            api_key: None,
            max_upload_bytes: 100 * 1024 * 1024,
            request_timeout: Duration::from_secs(600),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            ocr: OcrServiceConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("PORT", defaults.server.port),
                api_key: env::var("API_KEY").ok().filter(|k| !k.is_empty()),
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes),
                request_timeout: Duration::from_secs(parse_var(
                    "REQUEST_TIMEOUT_SECS",
                    defaults.server.request_timeout.as_secs(),
                )),
            },
            ocr: OcrServiceConfig {
                binary: env::var("OCR_BINARY").unwrap_or(defaults.ocr.binary),
                timeout: Duration::from_secs(parse_var(
                    "OCR_TIMEOUT_SECS",
                    defaults.ocr.timeout.as_secs(),
                )),
                pdftotext_binary: env::var("PDFTOTEXT_BINARY")
                    .unwrap_or(defaults.ocr.pdftotext_binary),
                text_timeout: Duration::from_secs(parse_var(
                    "TEXT_EXTRACT_TIMEOUT_SECS",
                    defaults.ocr.text_timeout.as_secs(),
                )),
                default_language: env::var("OCR_DEFAULT_LANGUAGE")
                    .unwrap_or(defaults.ocr.default_language),
                text_threshold: parse_var("OCR_TEXT_THRESHOLD", defaults.ocr.text_threshold),
                scratch_dir: env::var("SCRATCH_DIR").ok().map(PathBuf::from),
            },
        }
    }
}

fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => parse_or(name, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr + Copy>(name: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid value for {}: {:?}, using default", name, raw);
        default
    })
}
