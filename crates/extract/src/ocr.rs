use thiserror::Error;

use crate::preprocess;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("no OCR engine configured — build with `tesseract` feature")]
    NotConfigured,
}

/// Abstraction over a local OCR backend. Implementations accept normalized
/// PNG bytes and return the recognized text.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image_png: &[u8]) -> Result<String, OcrError>;
}

/// Preprocess then recognize, collapsing every failure to an empty string.
/// Unreadable images degrade instead of aborting: downstream strategies
/// detect emptiness and fall back further.
pub fn recognize_or_empty<E: OcrEngine>(engine: &E, image_bytes: &[u8]) -> String {
    let prepared = match preprocess::prepare_for_ocr(image_bytes) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("OCR preprocessing failed, degrading to empty text: {e}");
            return String::new();
        }
    };
    match engine.recognize(&prepared) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("OCR recognition failed, degrading to empty text: {e}");
            String::new()
        }
    }
}

// ── Mock engine (always available, used for tests) ────────────────────────────

/// Returns a pre-set string regardless of input, so the rest of the pipeline
/// can be tested without Tesseract installed.
pub struct MockOcr {
    pub text: String,
}

impl MockOcr {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrEngine for MockOcr {
    fn recognize(&self, _image_png: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Placeholder engine for deployments without OCR support.
pub struct NoOcr;

impl OcrEngine for NoOcr {
    fn recognize(&self, _image_png: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::NotConfigured)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrEngine, OcrError};
    use leptess::LepTess;

    pub struct TesseractOcr {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractOcr {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrEngine for TesseractOcr {
        fn recognize(&self, image_png: &[u8]) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
