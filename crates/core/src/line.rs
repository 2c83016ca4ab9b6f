use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which strategy produced a given line. The regex variant carries the id of
/// the pattern that matched, e.g. `regex:two-date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SourceMethod {
    Vision,
    ModelText,
    Regex(String),
}

impl std::fmt::Display for SourceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMethod::Vision => write!(f, "vision"),
            SourceMethod::ModelText => write!(f, "model-text"),
            SourceMethod::Regex(id) => write!(f, "regex:{id}"),
        }
    }
}

impl From<SourceMethod> for String {
    fn from(m: SourceMethod) -> String {
        m.to_string()
    }
}

impl TryFrom<String> for SourceMethod {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "vision" => Ok(SourceMethod::Vision),
            "model-text" => Ok(SourceMethod::ModelText),
            other => match other.strip_prefix("regex:") {
                Some(id) if !id.is_empty() => Ok(SourceMethod::Regex(id.to_string())),
                _ => Err(format!("unknown source method: '{other}'")),
            },
        }
    }
}

/// One candidate transaction. Amounts are exact decimals, never binary
/// floats, so cent values survive serialization untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedLine {
    /// Calendar date, if one could be resolved for this line.
    pub date: Option<NaiveDate>,
    pub description: String,
    /// Signed amount; credits/refunds are negative when the document marks
    /// them so (parentheses, trailing minus, CR suffix).
    pub amount: Decimal,
    pub method: SourceMethod,
    /// Per-line confidence (0.0–1.0).
    pub confidence: f32,
}

impl ExtractedLine {
    pub fn new(
        date: Option<NaiveDate>,
        description: impl Into<String>,
        amount: Decimal,
        method: SourceMethod,
        confidence: f32,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            amount,
            method,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A line is well-formed when it carries a description and an amount.
    /// Lines failing this are dropped rather than surfaced.
    pub fn is_well_formed(&self) -> bool {
        !self.description.trim().is_empty()
    }
}
