use thiserror::Error;
use tracing::{debug, info, warn};

use folio_core::{DocumentOrigin, ExtractionRequest, FileKind, LoadError, RawDocument};

use crate::ocr::{recognize_or_empty, OcrEngine};

/// Below this many non-whitespace characters a page's text layer is treated
/// as absent and the page is routed through rasterization + OCR.
const MIN_TEXT_CHARS: usize = 30;

/// Share of image-only pages above which the whole PDF counts as scanned.
const SCANNED_PAGE_RATIO: f64 = 0.8;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("no rasterizer backend configured")]
    NotConfigured,
    #[error("rasterization failed: {0}")]
    Failed(String),
}

/// Renders one PDF page to PNG bytes for OCR. Page numbers are 1-based.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf_bytes: &[u8], page_number: u32) -> Result<Vec<u8>, RasterError>;
}

/// Deployments without a rasterizer backend: scanned pages degrade to empty
/// text instead of failing the extraction.
pub struct NoRasterizer;

impl PageRasterizer for NoRasterizer {
    fn rasterize(&self, _pdf_bytes: &[u8], _page_number: u32) -> Result<Vec<u8>, RasterError> {
        Err(RasterError::NotConfigured)
    }
}

/// Returns a fixed PNG for every page — lets tests drive the OCR branch.
pub struct MockRasterizer {
    pub png: Vec<u8>,
}

impl PageRasterizer for MockRasterizer {
    fn rasterize(&self, _pdf_bytes: &[u8], _page_number: u32) -> Result<Vec<u8>, RasterError> {
        Ok(self.png.clone())
    }
}

/// Turns an `ExtractionRequest` into plain-text `RawDocument`s, one per PDF
/// page. The only errors raised are the loader-level ones requiring user
/// action; everything else degrades to empty text.
pub struct DocumentLoader<R: PageRasterizer> {
    rasterizer: R,
}

impl<R: PageRasterizer> DocumentLoader<R> {
    pub fn new(rasterizer: R) -> Self {
        Self { rasterizer }
    }

    pub fn load<E: OcrEngine>(
        &self,
        request: &ExtractionRequest,
        ocr: &E,
    ) -> Result<Vec<RawDocument>, LoadError> {
        if !request.is_allowed() {
            return Err(LoadError::UnsupportedFormat(request.extension().to_string()));
        }
        match request.kind() {
            // Image bytes pass straight through; OCR/vision read them later.
            FileKind::Image => Ok(vec![RawDocument::new(
                String::new(),
                DocumentOrigin::Image,
                None,
            )]),
            FileKind::Pdf => self.load_pdf(request, ocr),
        }
    }

    fn load_pdf<E: OcrEngine>(
        &self,
        request: &ExtractionRequest,
        ocr: &E,
    ) -> Result<Vec<RawDocument>, LoadError> {
        let mut doc = match lopdf::Document::load_mem(request.bytes()) {
            Ok(d) => d,
            Err(e) => {
                warn!("failed to parse PDF structure, degrading to empty text: {e}");
                return Ok(vec![RawDocument::new(
                    String::new(),
                    DocumentOrigin::PdfText,
                    None,
                )]);
            }
        };

        // Encryption must be settled before any extraction strategy runs.
        let mut decrypted_bytes: Option<Vec<u8>> = None;
        if doc.is_encrypted() {
            let password = request.password().ok_or(LoadError::PasswordRequired)?;
            doc.decrypt(password).map_err(|_| LoadError::InvalidPassword)?;
            let mut buf = Vec::new();
            if doc.save_to(&mut buf).is_ok() {
                decrypted_bytes = Some(buf);
            }
            info!("encrypted PDF decrypted successfully");
        }
        let bytes = decrypted_bytes.as_deref().unwrap_or(request.bytes());

        let page_texts = match pdf_extract::extract_text_from_mem_by_pages(bytes) {
            Ok(pages) => pages,
            Err(e) => {
                debug!("text-layer extraction failed, treating all pages as scanned: {e}");
                Vec::new()
            }
        };

        let structural_pages = doc.get_pages().len();
        let scanned = looks_like_scanned(&doc);
        let page_count = structural_pages.max(page_texts.len()).max(1);

        let mut out = Vec::with_capacity(page_count);
        for i in 0..page_count {
            let text = page_texts.get(i).cloned().unwrap_or_default();
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful >= MIN_TEXT_CHARS && !scanned {
                out.push(RawDocument::new(text, DocumentOrigin::PdfText, Some(i + 1)));
            } else {
                let ocr_text = match self.rasterizer.rasterize(bytes, (i + 1) as u32) {
                    Ok(png) => recognize_or_empty(ocr, &png),
                    Err(e) => {
                        debug!("page {} not rasterized: {e}", i + 1);
                        String::new()
                    }
                };
                out.push(RawDocument::new(ocr_text, DocumentOrigin::PdfOcr, Some(i + 1)));
            }
        }
        Ok(out)
    }
}

/// Structural scanned-PDF check: pages whose resources hold XObject images
/// but no fonts are almost certainly scans.
fn looks_like_scanned(doc: &lopdf::Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let mut image_only = 0usize;
    for object_id in pages.values() {
        let Ok(page_obj) = doc.get_object(*object_id) else {
            continue;
        };
        let Ok(page_dict) = page_obj.as_dict() else {
            continue;
        };

        let resolved_resources = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok());

        let has_fonts = resolved_resources
            .and_then(|res| res.get(b"Font").ok())
            .and_then(|f| doc.dereference(f).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .is_some_and(|fonts| !fonts.is_empty());

        let has_images = resolved_resources
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|x| doc.dereference(x).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .is_some_and(|xobjs| !xobjs.is_empty());

        if has_images && !has_fonts {
            image_only += 1;
        }
    }

    image_only as f64 / pages.len() as f64 >= SCANNED_PAGE_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::MockOcr;
    use lopdf::{dictionary, Object, StringFormat};

    fn image_request(ext: &str) -> ExtractionRequest {
        ExtractionRequest::new(vec![1, 2, 3], ext, None)
    }

    #[test]
    fn rejects_unsupported_extension() {
        let loader = DocumentLoader::new(NoRasterizer);
        let err = loader
            .load(&image_request("docx"), &MockOcr::new(""))
            .unwrap_err();
        assert_eq!(err, LoadError::UnsupportedFormat("docx".into()));
    }

    #[test]
    fn image_passes_through_without_text() {
        let loader = DocumentLoader::new(NoRasterizer);
        let docs = loader.load(&image_request("jpg"), &MockOcr::new("")).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].origin, DocumentOrigin::Image);
        assert!(docs[0].is_empty());
    }

    #[test]
    fn corrupt_pdf_degrades_to_empty_text() {
        let loader = DocumentLoader::new(NoRasterizer);
        let req = ExtractionRequest::new(b"not a pdf at all".to_vec(), "pdf", None);
        let docs = loader.load(&req, &MockOcr::new("")).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].is_empty());
    }

    #[test]
    fn minimal_pdf_yields_ocr_page_when_no_text_layer() {
        // A structurally valid, empty one-page PDF — no text layer, so the
        // page routes through the (mock) rasterizer + OCR branch.
        let pdf = minimal_pdf_bytes();
        let loader = DocumentLoader::new(MockRasterizer { png: tiny_png() });
        let req = ExtractionRequest::new(pdf, "pdf", None);
        let docs = loader
            .load(&req, &MockOcr::new("TOTAL $12.00"))
            .unwrap();
        assert!(!docs.is_empty());
        assert_eq!(docs[0].origin, DocumentOrigin::PdfOcr);
        assert_eq!(docs[0].text, "TOTAL $12.00");
    }

    fn tiny_png() -> Vec<u8> {
        use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |x, _| Luma([(x * 60) as u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn blank_page_doc() -> lopdf::Document {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn minimal_pdf_bytes() -> Vec<u8> {
        let mut doc = blank_page_doc();
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    // Standard security handler, V1/R2 (RC4 40-bit), user password "secret".
    // /U is the RC4 keystream check value derived from /O, /P, and the file
    // ID below; /O itself is only key material at this revision.
    const OWNER_ENTRY: [u8; 32] = *b"0123456789ABCDEF0123456789ABCDEF";
    const USER_ENTRY: [u8; 32] = [
        0xf0, 0xa0, 0xb5, 0x3b, 0x25, 0x78, 0x06, 0x41, 0x4f, 0x35, 0x72, 0xf0,
        0x08, 0x2f, 0xcc, 0x4a, 0x47, 0x79, 0xe9, 0x82, 0x3b, 0x53, 0x30, 0x85,
        0xb6, 0x7f, 0xbc, 0x6f, 0xda, 0xab, 0x84, 0xae,
    ];
    const FILE_ID: [u8; 16] = *b"folio-test-id-01";

    fn encrypted_pdf_bytes() -> Vec<u8> {
        let mut doc = blank_page_doc();
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "O" => Object::String(OWNER_ENTRY.to_vec(), StringFormat::Hexadecimal),
            "U" => Object::String(USER_ENTRY.to_vec(), StringFormat::Hexadecimal),
            "P" => -1,
            "CF" => dictionary! {
                "StdCF" => dictionary! { "CFM" => "V2" },
            },
        });
        doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
        doc.trailer.set(
            "ID",
            Object::Array(vec![
                Object::String(FILE_ID.to_vec(), StringFormat::Hexadecimal),
                Object::String(FILE_ID.to_vec(), StringFormat::Hexadecimal),
            ]),
        );
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn encrypted_pdf_without_password_requires_one() {
        let loader = DocumentLoader::new(NoRasterizer);
        let req = ExtractionRequest::new(encrypted_pdf_bytes(), "pdf", None);
        let err = loader.load(&req, &MockOcr::new("")).unwrap_err();
        assert_eq!(err, LoadError::PasswordRequired);
    }

    #[test]
    fn encrypted_pdf_with_wrong_password_is_rejected() {
        let loader = DocumentLoader::new(NoRasterizer);
        let req = ExtractionRequest::new(encrypted_pdf_bytes(), "pdf", Some("wrong".into()));
        let err = loader.load(&req, &MockOcr::new("")).unwrap_err();
        assert_eq!(err, LoadError::InvalidPassword);
    }

    #[test]
    fn encrypted_pdf_with_correct_password_loads() {
        let loader = DocumentLoader::new(NoRasterizer);
        let req = ExtractionRequest::new(encrypted_pdf_bytes(), "pdf", Some("secret".into()));
        let docs = loader.load(&req, &MockOcr::new("")).unwrap();
        assert_eq!(docs.len(), 1);
    }
}
