//! Strategy chain driving one extraction request end to end.
//!
//! Order is fixed: vision (images only), then local OCR / PDF text feeding a
//! text model, then the regex parser. The first strategy producing at least
//! one usable line wins; every attempt leaves a diagnostic behind so callers
//! can see why a document ended up empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use folio_core::{
    DocumentOrigin, ExtractedLine, ExtractionMethod, ExtractionRequest, ExtractionResult,
    FileKind, LoadError, SourceMethod, StatementKind,
};

use crate::detect::detect;
use crate::loader::{DocumentLoader, PageRasterizer};
use crate::model::{CandidateLine, TextModel, VisionModel};
use crate::ocr::{recognize_or_empty, OcrEngine};
use crate::parser::{self, ParserConfig};

const VISION_CONFIDENCE: f32 = 0.9;
const MODEL_TEXT_CONFIDENCE: f32 = 0.8;

/// Cooperative cancellation handle. Checked between strategies, not inside
/// them; an in-flight model call runs to completion.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct Orchestrator<V, T, E, R>
where
    V: VisionModel,
    T: TextModel,
    E: OcrEngine + 'static,
    R: PageRasterizer + 'static,
{
    vision: V,
    model: T,
    ocr: Arc<E>,
    loader: Arc<DocumentLoader<R>>,
    parser: ParserConfig,
}

impl<V, T, E, R> Orchestrator<V, T, E, R>
where
    V: VisionModel,
    T: TextModel,
    E: OcrEngine + 'static,
    R: PageRasterizer + 'static,
{
    pub fn new(vision: V, model: T, ocr: E, rasterizer: R, parser: ParserConfig) -> Self {
        Self {
            vision,
            model,
            ocr: Arc::new(ocr),
            loader: Arc::new(DocumentLoader::new(rasterizer)),
            parser,
        }
    }

    /// Run the full chain for one request. Loader-level errors (unsupported
    /// format, password problems) surface as `Err`; every other failure mode
    /// degrades to an empty result with diagnostics.
    pub async fn extract(
        &self,
        request: &ExtractionRequest,
        cancel: &CancelFlag,
    ) -> Result<ExtractionResult, LoadError> {
        let mut diagnostics = Vec::new();

        let documents = {
            let loader = Arc::clone(&self.loader);
            let ocr = Arc::clone(&self.ocr);
            let req = request.clone();
            match tokio::task::spawn_blocking(move || loader.load(&req, ocr.as_ref())).await {
                Ok(Ok(docs)) => docs,
                Ok(Err(e)) => return Err(e),
                Err(e) => {
                    warn!("document loader task failed: {e}");
                    diagnostics.push(format!("loader: task failed: {e}"));
                    return Ok(ExtractionResult::empty(diagnostics));
                }
            }
        };
        diagnostics.push(format!("loader: {} document(s)", documents.len()));

        if cancel.is_cancelled() {
            diagnostics.push("cancelled before vision".into());
            return Ok(ExtractionResult::empty(diagnostics));
        }

        // Vision reads the raw image; PDFs go straight to the text chain.
        if request.kind() == FileKind::Image {
            match self.vision.extract_image(request.bytes(), request.mime_type()).await {
                Ok(candidates) => {
                    let lines =
                        usable_lines(candidates, SourceMethod::Vision, VISION_CONFIDENCE);
                    if lines.is_empty() {
                        diagnostics.push("vision: response had no usable lines".into());
                    } else {
                        info!(lines = lines.len(), "vision extraction succeeded");
                        diagnostics.push(format!("vision: {} line(s)", lines.len()));
                        let kind = kind_for(&lines);
                        return Ok(ExtractionResult::new(
                            kind,
                            lines,
                            ExtractionMethod::Vision,
                            diagnostics,
                        ));
                    }
                }
                Err(e) => {
                    debug!("vision strategy failed: {e}");
                    diagnostics.push(format!("vision: {e}"));
                }
            }
        } else {
            diagnostics.push("vision: skipped for pdf input".into());
        }

        if cancel.is_cancelled() {
            diagnostics.push("cancelled before text extraction".into());
            return Ok(ExtractionResult::empty(diagnostics));
        }

        let text = self.assemble_text(request, &documents).await;
        if text.is_empty() {
            diagnostics.push("text: no text recovered from document".into());
            return Ok(ExtractionResult::empty(diagnostics));
        }
        diagnostics.push(format!("text: {} chars recovered", text.len()));

        let hint = detect(&text);

        if cancel.is_cancelled() {
            diagnostics.push("cancelled before model parsing".into());
            return Ok(ExtractionResult::empty(diagnostics));
        }

        match self.model.parse_text(&text, hint).await {
            Ok(candidates) => {
                let lines =
                    usable_lines(candidates, SourceMethod::ModelText, MODEL_TEXT_CONFIDENCE);
                if lines.is_empty() {
                    diagnostics.push("model-text: response had no usable lines".into());
                } else {
                    info!(lines = lines.len(), "model text parsing succeeded");
                    diagnostics.push(format!("model-text: {} line(s)", lines.len()));
                    let kind = kind_for(&lines);
                    return Ok(ExtractionResult::new(
                        kind,
                        lines,
                        ExtractionMethod::ModelText,
                        diagnostics,
                    ));
                }
            }
            Err(e) => {
                debug!("model text strategy failed: {e}");
                diagnostics.push(format!("model-text: {e}"));
            }
        }

        if cancel.is_cancelled() {
            diagnostics.push("cancelled before regex parsing".into());
            return Ok(ExtractionResult::empty(diagnostics));
        }

        let lines = parser::parse(&text, hint, &self.parser);
        if lines.is_empty() {
            diagnostics.push("regex: no pattern matched".into());
        } else {
            info!(lines = lines.len(), "regex parsing succeeded");
            diagnostics.push(format!("regex: {} line(s)", lines.len()));
            return Ok(ExtractionResult::new(
                hint,
                lines,
                ExtractionMethod::Regex,
                diagnostics,
            ));
        }

        Ok(ExtractionResult::empty(diagnostics))
    }

    /// Join all per-page text. Image documents carry no text yet, so they run
    /// through local OCR here, off the async runtime.
    async fn assemble_text(
        &self,
        request: &ExtractionRequest,
        documents: &[folio_core::RawDocument],
    ) -> String {
        let mut parts = Vec::with_capacity(documents.len());
        for doc in documents {
            if doc.origin == DocumentOrigin::Image {
                let ocr = Arc::clone(&self.ocr);
                let bytes = request.bytes().to_vec();
                let recognized =
                    tokio::task::spawn_blocking(move || recognize_or_empty(ocr.as_ref(), &bytes))
                        .await
                        .unwrap_or_default();
                parts.push(recognized);
            } else {
                parts.push(doc.text.clone());
            }
        }
        parts.join("\n").trim().to_string()
    }
}

fn usable_lines(
    candidates: Vec<CandidateLine>,
    method: SourceMethod,
    confidence: f32,
) -> Vec<ExtractedLine> {
    candidates
        .into_iter()
        .map(|c| ExtractedLine::new(c.date, c.description, c.amount, method.clone(), confidence))
        .filter(ExtractedLine::is_well_formed)
        .collect()
}

fn kind_for(lines: &[ExtractedLine]) -> StatementKind {
    if lines.len() > 1 {
        StatementKind::Multi
    } else {
        StatementKind::Single
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::NoRasterizer;
    use crate::model::{MockTextModel, MockVision};
    use crate::ocr::MockOcr;
    use chrono::NaiveDate;
    use folio_core::StrategyError;
    use rust_decimal::Decimal;
    use std::io::Cursor;
    use std::str::FromStr;

    fn candidate(desc: &str, amount: &str) -> CandidateLine {
        CandidateLine {
            date: NaiveDate::from_ymd_opt(2024, 10, 1),
            description: desc.to_string(),
            amount: Decimal::from_str(amount).unwrap(),
        }
    }

    fn png_request() -> ExtractionRequest {
        use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
        let img: GrayImage = ImageBuffer::from_fn(8, 8, |x, y| Luma([((x + y) * 16) as u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        ExtractionRequest::new(buf, "png", None)
    }

    #[tokio::test]
    async fn vision_wins_for_images() {
        let orch = Orchestrator::new(
            MockVision(Ok(vec![candidate("STARBUCKS", "5.50")])),
            MockTextModel(Err(StrategyError::ModelUnavailable("unused".into()))),
            MockOcr::new(""),
            NoRasterizer,
            ParserConfig::default(),
        );
        let result = orch.extract(&png_request(), &CancelFlag::new()).await.unwrap();
        assert_eq!(result.method, Some(ExtractionMethod::Vision));
        assert_eq!(result.kind, StatementKind::Single);
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].method, SourceMethod::Vision);
        assert_eq!(result.lines[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn vision_failure_falls_back_to_model_text() {
        let orch = Orchestrator::new(
            MockVision(Err(StrategyError::VisionParseError("not json".into()))),
            MockTextModel(Ok(vec![
                candidate("AMAZON.COM", "45.99"),
                candidate("SHELL OIL", "30.00"),
            ])),
            MockOcr::new("10/01/24  AMAZON.COM  45.99\n10/03/24  SHELL OIL  30.00"),
            NoRasterizer,
            ParserConfig::default(),
        );
        let result = orch.extract(&png_request(), &CancelFlag::new()).await.unwrap();
        assert_eq!(result.method, Some(ExtractionMethod::ModelText));
        assert_eq!(result.kind, StatementKind::Multi);
        assert_eq!(result.lines.len(), 2);
        assert!(result.diagnostics.iter().any(|d| d.starts_with("vision:")));
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_regex() {
        let statement = "\
09/01/24  AMAZON.COM ORDER  45.99
09/03/24  SHELL OIL 57442  30.00
09/05/24  NETFLIX.COM SUBSCRIPTION  15.49";
        let orch = Orchestrator::new(
            MockVision(Err(StrategyError::VisionUnavailable("no key".into()))),
            MockTextModel(Err(StrategyError::ModelUnavailable("no key".into()))),
            MockOcr::new(statement),
            NoRasterizer,
            ParserConfig::default(),
        );
        let result = orch.extract(&png_request(), &CancelFlag::new()).await.unwrap();
        assert_eq!(result.method, Some(ExtractionMethod::Regex));
        assert_eq!(result.kind, StatementKind::Multi);
        assert_eq!(result.lines.len(), 3);
    }

    #[tokio::test]
    async fn regex_parses_lone_statement_line_receipt() {
        // A one-transaction upload classifies as `single` yet carries a
        // statement-shaped line; the regex stage must still extract it.
        let orch = Orchestrator::new(
            MockVision(Err(StrategyError::VisionUnavailable("no key".into()))),
            MockTextModel(Err(StrategyError::ModelUnavailable("no key".into()))),
            MockOcr::new("10/01/24  10/02/24  AMAZON.COM  45.99"),
            NoRasterizer,
            ParserConfig::default(),
        );
        let result = orch.extract(&png_request(), &CancelFlag::new()).await.unwrap();
        assert_eq!(result.method, Some(ExtractionMethod::Regex));
        assert_eq!(result.kind, StatementKind::Single);
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].description, "AMAZON.COM");
    }

    #[tokio::test]
    async fn vision_blank_lines_do_not_win() {
        let orch = Orchestrator::new(
            MockVision(Ok(vec![candidate("   ", "5.50")])),
            MockTextModel(Err(StrategyError::ModelUnavailable("no key".into()))),
            MockOcr::new(""),
            NoRasterizer,
            ParserConfig::default(),
        );
        let result = orch.extract(&png_request(), &CancelFlag::new()).await.unwrap();
        assert!(result.is_empty());
        assert!(result.method.is_none());
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.contains("no usable lines")));
    }

    #[tokio::test]
    async fn empty_text_exhausts_quietly() {
        let orch = Orchestrator::new(
            MockVision(Err(StrategyError::VisionUnavailable("no key".into()))),
            MockTextModel(Ok(vec![candidate("SHOULD NOT RUN", "1.00")])),
            MockOcr::new(""),
            NoRasterizer,
            ParserConfig::default(),
        );
        let result = orch.extract(&png_request(), &CancelFlag::new()).await.unwrap();
        assert!(result.is_empty());
        assert!(result.method.is_none());
        assert!(!result.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn unsupported_format_surfaces_as_error() {
        let orch = Orchestrator::new(
            MockVision(Ok(vec![candidate("X", "1.00")])),
            MockTextModel(Ok(vec![])),
            MockOcr::new(""),
            NoRasterizer,
            ParserConfig::default(),
        );
        let req = ExtractionRequest::new(vec![1, 2, 3], "docx", None);
        let err = orch.extract(&req, &CancelFlag::new()).await.unwrap_err();
        assert_eq!(err, LoadError::UnsupportedFormat("docx".into()));
    }

    #[tokio::test]
    async fn corrupt_pdf_degrades_to_empty_result() {
        let orch = Orchestrator::new(
            MockVision(Ok(vec![candidate("SHOULD NOT RUN", "1.00")])),
            MockTextModel(Err(StrategyError::ModelUnavailable("no key".into()))),
            MockOcr::new(""),
            NoRasterizer,
            ParserConfig::default(),
        );
        let req = ExtractionRequest::new(b"not a pdf at all".to_vec(), "pdf", None);
        let result = orch.extract(&req, &CancelFlag::new()).await.unwrap();
        assert!(result.is_empty());
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.contains("skipped for pdf")));
    }

    #[tokio::test]
    async fn cancellation_stops_the_chain() {
        let orch = Orchestrator::new(
            MockVision(Ok(vec![candidate("SHOULD NOT WIN", "1.00")])),
            MockTextModel(Ok(vec![])),
            MockOcr::new(""),
            NoRasterizer,
            ParserConfig::default(),
        );
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = orch.extract(&png_request(), &cancel).await.unwrap();
        assert!(result.is_empty());
        assert!(result.diagnostics.iter().any(|d| d.contains("cancelled")));
    }
}
