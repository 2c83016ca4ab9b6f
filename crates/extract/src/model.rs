//! Vision and text extraction backed by a multimodal language model.
//!
//! Both strategies share the same strict output contract: a JSON object with
//! a `line_items` array of `{date, description, amount}` entries. Responses
//! violating the contract are rejected so the orchestrator can fall back.
//! The model is never second-guessed or retried.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use base64::Engine as _;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use folio_core::{StatementKind, StrategyError};

use crate::scan::re;

/// One `{date, description, amount}` candidate from a model response.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLine {
    pub date: Option<NaiveDate>,
    pub description: String,
    pub amount: Decimal,
}

/// Multimodal strategy: image bytes in, candidate lines out.
/// One attempt per request; failures fall through, never retry.
pub trait VisionModel: Send + Sync {
    fn extract_image(
        &self,
        image: &[u8],
        mime: &str,
    ) -> impl Future<Output = Result<Vec<CandidateLine>, StrategyError>> + Send;
}

/// Text strategy: previously obtained text (OCR or PDF text layer) in,
/// candidate lines out.
pub trait TextModel: Send + Sync {
    fn parse_text(
        &self,
        text: &str,
        hint: StatementKind,
    ) -> impl Future<Output = Result<Vec<CandidateLine>, StrategyError>> + Send;
}

// ── Output contract ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct WirePayload {
    line_items: Vec<WireItem>,
}

#[derive(Deserialize)]
struct WireItem {
    #[serde(default)]
    date: Option<String>,
    description: String,
    #[serde(deserialize_with = "decimal_lossless")]
    amount: Decimal,
}

/// Deserialize a JSON number through its exact textual form rather than via
/// f64, so cent values never drift.
fn decimal_lossless<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => {
            Decimal::from_str(&n.to_string()).map_err(serde::de::Error::custom)
        }
        serde_json::Value::String(s) => {
            Decimal::from_str(s.trim()).map_err(serde::de::Error::custom)
        }
        other => Err(serde::de::Error::custom(format!(
            "amount must be a number, got {other}"
        ))),
    }
}

re!(re_code_fence, r"(?s)```(?:json)?\s*(.*?)\s*```");

/// Parse a model response against the contract. Markdown code fences around
/// the JSON are tolerated; anything else malformed is an error.
pub(crate) fn parse_contract(response_text: &str) -> Result<Vec<CandidateLine>, String> {
    let json_str = re_code_fence()
        .captures(response_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(response_text.trim());

    let payload: WirePayload =
        serde_json::from_str(json_str).map_err(|e| format!("contract violation: {e}"))?;

    Ok(payload
        .line_items
        .into_iter()
        .map(|item| CandidateLine {
            // Dates the model could not normalize become null, not errors.
            date: item
                .date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            description: item.description.trim().to_string(),
            amount: item.amount,
        })
        .collect())
}

// ── HTTP client ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Full `generateContent` endpoint URL.
    pub endpoint: String,
    pub api_key: String,
    /// Request-level timeout; a timeout is a strategy failure, not a retry.
    pub timeout: Duration,
}

impl ModelConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

const VISION_PROMPT: &str = "\
Extract ALL transactions from this image. Always return multiple line items.

ALWAYS return this exact JSON format (no other format):
{\"line_items\": [{\"date\": \"YYYY-MM-DD\", \"description\": \"merchant or description\", \"amount\": -123.45}]}

RULES:
1. ALWAYS return a \"line_items\" array - even for a single receipt (1-item array)
2. Extract EVERY transaction visible in the image
3. Date format: YYYY-MM-DD only
4. Amounts: numbers only, no currency symbols
5. If multiple dates per line, use the first date
6. Return ONLY the JSON format shown above";

fn text_prompt(text: &str, hint: StatementKind) -> String {
    let hint_line = match hint {
        StatementKind::Single => "This text is a single purchase receipt.",
        StatementKind::Multi => "This text is a multi-transaction bank or card statement.",
    };
    format!(
        "Parse this OCR-extracted text into structured transaction data. {hint_line}\n\n\
         TEXT:\n{text}\n\n\
         ALWAYS return this exact JSON format (no other format):\n\
         {{\"line_items\": [{{\"date\": \"YYYY-MM-DD\", \"description\": \"merchant or description\", \"amount\": -123.45}}]}}\n\n\
         RULES:\n\
         1. ALWAYS return a \"line_items\" array - even for a single receipt\n\
         2. Dates, descriptions, and amounts may sit on separate lines - match them by position\n\
         3. Date format: YYYY-MM-DD only (convert MM/DD/YY)\n\
         4. Amounts: numbers only, no currency symbols\n\
         5. Return ONLY the JSON format shown above"
    )
}

enum CallError {
    Unavailable(String),
    Malformed(String),
}

/// `generateContent`-style HTTP client implementing both model seams.
pub struct HttpModelClient {
    http: reqwest::Client,
    config: ModelConfig,
}

impl HttpModelClient {
    pub fn new(config: ModelConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    async fn generate(&self, parts: serde_json::Value) -> Result<String, CallError> {
        if self.config.api_key.is_empty() {
            return Err(CallError::Unavailable("no API key configured".into()));
        }
        let url = format!("{}?key={}", self.config.endpoint, self.config.api_key);
        let body = serde_json::json!({ "contents": [{ "parts": parts }] });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::Unavailable(format!("HTTP {status}")));
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CallError::Malformed(e.to_string()))?;

        envelope["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CallError::Malformed("response carries no text part".into()))
    }
}

impl VisionModel for HttpModelClient {
    async fn extract_image(
        &self,
        image: &[u8],
        mime: &str,
    ) -> Result<Vec<CandidateLine>, StrategyError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let parts = serde_json::json!([
            { "text": VISION_PROMPT },
            { "inline_data": { "mime_type": mime, "data": encoded } },
        ]);
        let text = self.generate(parts).await.map_err(|e| match e {
            CallError::Unavailable(m) => StrategyError::VisionUnavailable(m),
            CallError::Malformed(m) => StrategyError::VisionParseError(m),
        })?;
        parse_contract(&text).map_err(StrategyError::VisionParseError)
    }
}

impl TextModel for HttpModelClient {
    async fn parse_text(
        &self,
        text: &str,
        hint: StatementKind,
    ) -> Result<Vec<CandidateLine>, StrategyError> {
        let parts = serde_json::json!([{ "text": text_prompt(text, hint) }]);
        let response = self.generate(parts).await.map_err(|e| match e {
            CallError::Unavailable(m) => StrategyError::ModelUnavailable(m),
            CallError::Malformed(m) => StrategyError::ModelParseError(m),
        })?;
        parse_contract(&response).map_err(StrategyError::ModelParseError)
    }
}

// ── Mocks ─────────────────────────────────────────────────────────────────────

/// Fixed-outcome vision model for tests.
pub struct MockVision(pub Result<Vec<CandidateLine>, StrategyError>);

impl VisionModel for MockVision {
    async fn extract_image(
        &self,
        _image: &[u8],
        _mime: &str,
    ) -> Result<Vec<CandidateLine>, StrategyError> {
        self.0.clone()
    }
}

/// Fixed-outcome text model for tests.
pub struct MockTextModel(pub Result<Vec<CandidateLine>, StrategyError>);

impl TextModel for MockTextModel {
    async fn parse_text(
        &self,
        _text: &str,
        _hint: StatementKind,
    ) -> Result<Vec<CandidateLine>, StrategyError> {
        self.0.clone()
    }
}

/// Stand-in for deployments with no model API configured: both strategies
/// report themselves unavailable and the chain falls through.
pub struct Disabled;

impl VisionModel for Disabled {
    async fn extract_image(
        &self,
        _image: &[u8],
        _mime: &str,
    ) -> Result<Vec<CandidateLine>, StrategyError> {
        Err(StrategyError::VisionUnavailable("not configured".into()))
    }
}

impl TextModel for Disabled {
    async fn parse_text(
        &self,
        _text: &str,
        _hint: StatementKind,
    ) -> Result<Vec<CandidateLine>, StrategyError> {
        Err(StrategyError::ModelUnavailable("not configured".into()))
    }
}
