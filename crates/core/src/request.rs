use serde::{Deserialize, Serialize};

/// File types accepted by the document loader. Anything else is rejected
/// with `LoadError::UnsupportedFormat` before extraction starts.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "pdf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Pdf,
}

/// One uploaded document, as handed over by the upload boundary.
/// Immutable once created; consumed once per extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    bytes: Vec<u8>,
    extension: String,
    password: Option<String>,
}

impl ExtractionRequest {
    pub fn new(bytes: Vec<u8>, extension: &str, password: Option<String>) -> Self {
        Self {
            bytes,
            extension: extension.trim_start_matches('.').to_lowercase(),
            password,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn is_allowed(&self) -> bool {
        ALLOWED_EXTENSIONS.contains(&self.extension.as_str())
    }

    pub fn kind(&self) -> FileKind {
        if self.extension == "pdf" {
            FileKind::Pdf
        } else {
            FileKind::Image
        }
    }

    /// MIME type for the declared extension, used by the vision extractor.
    pub fn mime_type(&self) -> &'static str {
        match self.extension.as_str() {
            "png" => "image/png",
            "webp" => "image/webp",
            "pdf" => "application/pdf",
            _ => "image/jpeg",
        }
    }
}
