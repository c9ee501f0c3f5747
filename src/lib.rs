//! PDF OCR Server Library
//!
//! Extracts page text from scanned or partially scanned PDFs, keeping the
//! embedded text layer where it is usable and running OCRmyPDF only on the
//! pages that need it.
//!
//! # Modules
//!
//! - `ocr`: Extraction pipeline, recognition providers and sidecar parsing
//! - `routes`: HTTP endpoints
//! - `config`: Environment-driven configuration

pub mod config;
pub mod error;
pub mod ocr;
pub mod routes;
pub mod state;
