use serde::{Deserialize, Serialize};

/// How the text in a `RawDocument` was obtained. Downstream strategies use
/// this to decide applicability (vision only runs on `Image` documents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentOrigin {
    /// Raw image upload — no text yet; OCR or vision produces it.
    Image,
    /// Text layer extracted directly from a PDF.
    PdfText,
    /// Text recovered by OCR from a rasterized (scanned) PDF page.
    PdfOcr,
}

impl std::fmt::Display for DocumentOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentOrigin::Image => write!(f, "image"),
            DocumentOrigin::PdfText => write!(f, "pdf-text"),
            DocumentOrigin::PdfOcr => write!(f, "pdf-ocr"),
        }
    }
}

/// Plain text produced by the document loader, one per page for
/// multi-page PDFs. Never persisted; owned by the orchestrator for the
/// duration of one extraction call.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub text: String,
    pub origin: DocumentOrigin,
    pub page: Option<usize>,
}

impl RawDocument {
    pub fn new(text: impl Into<String>, origin: DocumentOrigin, page: Option<usize>) -> Self {
        Self { text: text.into(), origin, page }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
