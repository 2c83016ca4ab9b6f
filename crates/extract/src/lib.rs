pub mod detect;
pub mod loader;
pub mod model;
pub mod ocr;
pub mod orchestrator;
pub mod parser;
pub mod preprocess;
pub(crate) mod scan;

pub use detect::detect;
pub use loader::{DocumentLoader, MockRasterizer, NoRasterizer, PageRasterizer, RasterError};
pub use model::{
    CandidateLine, Disabled, HttpModelClient, MockTextModel, MockVision, ModelConfig, TextModel,
    VisionModel,
};
pub use ocr::{recognize_or_empty, MockOcr, NoOcr, OcrEngine, OcrError};
pub use orchestrator::{CancelFlag, Orchestrator};
pub use parser::{parse, DateColumn, ParserConfig};
pub use preprocess::{prepare_for_ocr, PreprocessError};
