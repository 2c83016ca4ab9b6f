pub mod document;
pub mod error;
pub mod line;
pub mod request;
pub mod result;

pub use document::{DocumentOrigin, RawDocument};
pub use error::{LoadError, StrategyError};
pub use line::{ExtractedLine, SourceMethod};
pub use request::{ExtractionRequest, FileKind, ALLOWED_EXTENSIONS};
pub use result::{ExtractionMethod, ExtractionResult, StatementKind};
