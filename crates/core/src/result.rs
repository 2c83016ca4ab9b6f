use serde::{Deserialize, Serialize};

use crate::line::ExtractedLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// One purchase receipt — exactly one transaction expected.
    Single,
    /// Bank/credit-card statement — many transaction lines.
    Multi,
}

/// Which strategy ultimately produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    #[serde(rename = "vision")]
    Vision,
    #[serde(rename = "model-text")]
    ModelText,
    #[serde(rename = "regex")]
    Regex,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMethod::Vision => write!(f, "vision"),
            ExtractionMethod::ModelText => write!(f, "model-text"),
            ExtractionMethod::Regex => write!(f, "regex"),
        }
    }
}

/// The normalized outcome of one extraction call. Created once per request,
/// immutable afterwards. Total failure is represented by an empty `lines`
/// list with a populated diagnostic trail, never by an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub kind: StatementKind,
    pub lines: Vec<ExtractedLine>,
    /// `None` when every strategy was exhausted without a result.
    pub method: Option<ExtractionMethod>,
    /// Ordered log of strategies attempted and why each failed or succeeded.
    pub diagnostics: Vec<String>,
}

impl ExtractionResult {
    pub fn new(
        kind: StatementKind,
        lines: Vec<ExtractedLine>,
        method: ExtractionMethod,
        diagnostics: Vec<String>,
    ) -> Self {
        Self { kind, lines, method: Some(method), diagnostics }
    }

    /// The "all strategies exhausted" outcome. Callers present this as
    /// "please enter manually" rather than an error.
    pub fn empty(diagnostics: Vec<String>) -> Self {
        Self {
            kind: StatementKind::Single,
            lines: Vec::new(),
            method: None,
            diagnostics,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_wire_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_wire_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::SourceMethod;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn empty_result_has_no_method() {
        let r = ExtractionResult::empty(vec!["vision: unavailable".into()]);
        assert!(r.is_empty());
        assert!(r.method.is_none());
        assert_eq!(r.diagnostics.len(), 1);
    }

    #[test]
    fn wire_roundtrip_preserves_exact_amounts() {
        let line = ExtractedLine::new(
            chrono::NaiveDate::from_ymd_opt(2024, 10, 2),
            "AMAZON.COM",
            Decimal::from_str("45.99").unwrap(),
            SourceMethod::Regex("two-date".into()),
            0.8,
        );
        let result = ExtractionResult::new(
            StatementKind::Multi,
            vec![line],
            ExtractionMethod::Regex,
            vec!["regex: 1 line matched".into()],
        );
        let json = result.to_wire_json().unwrap();
        let parsed = ExtractionResult::from_wire_json(&json).unwrap();
        assert_eq!(parsed, result);
        // Amounts stay decimal strings on the wire, not floats.
        assert!(json.contains("\"45.99\""));
    }

    #[test]
    fn wire_kind_tags() {
        let r = ExtractionResult::new(
            StatementKind::Single,
            vec![],
            ExtractionMethod::Vision,
            vec![],
        );
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["kind"], "single");
        assert_eq!(v["method"], "vision");
    }
}
