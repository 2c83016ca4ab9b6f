//! Deterministic, dependency-free fallback parser: an ordered table of
//! line-shape patterns, evaluated top-to-bottom per line, first match wins.
//! Total by construction: the worst outcome is an empty list, never an
//! error.

use regex::Regex;

use folio_core::{ExtractedLine, SourceMethod, StatementKind};

use crate::scan::{self, re, AMOUNT_TOKEN};

/// Which of the two date columns on `date date description amount` statement
/// lines is authoritative. Card statements disagree on the order of
/// transaction vs. posting date, so this is configuration, not a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateColumn {
    /// First column (the original layout's transaction date).
    #[default]
    Transaction,
    /// Second column (posting date).
    Posting,
}

#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    pub date_column: DateColumn,
}

// ── Statement line patterns, in priority order ────────────────────────────────

const DATE_MDY: &str = r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}";
const DATE_ISO: &str = r"\d{4}[/-]\d{1,2}[/-]\d{1,2}";
const DATE_MONTH_NAME: &str = r"(?:January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\.?\s+\d{1,2},?\s+\d{4}";

re!(re_two_date, format!(
    r"^(?P<date>{DATE_MDY})\s+(?P<date2>{DATE_MDY})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT_TOKEN})\s*$"
));
re!(re_pipe, format!(
    r"^(?P<date>{DATE_MDY}|{DATE_ISO})\s*\|\s*(?P<desc>[^|]+?)\s*\|\s*(?P<amount>{AMOUNT_TOKEN})\s*$"
));
re!(re_iso_date, format!(
    r"^(?P<date>{DATE_ISO})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT_TOKEN})\s*$"
));
re!(re_month_name, format!(
    r"(?i)^(?P<date>{DATE_MONTH_NAME})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT_TOKEN})\s*$"
));
re!(re_single_date, format!(
    r"^(?P<date>{DATE_MDY})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT_TOKEN})\s*$"
));

re!(re_item_line,
    r"(?i)^(?P<desc>[A-Za-z][A-Za-z .'&-]*?)\s+(?P<qty>\d{1,3})\s*(?:x|@)\s*\$?(?P<unit>[\d,]+\.\d{2})\s*$");
re!(re_date_only, format!(r"^(?:{DATE_MDY})$"));
re!(re_amount_only, format!(r"^{AMOUNT_TOKEN}$"));

struct StatementPattern {
    id: &'static str,
    regex: fn() -> &'static Regex,
    confidence: f32,
}

/// Flat, ordered registry. New statement layouts are additions to this
/// table, not edits to parsing logic.
const STATEMENT_PATTERNS: &[StatementPattern] = &[
    StatementPattern { id: "two-date", regex: re_two_date, confidence: 0.80 },
    StatementPattern { id: "pipe-delimited", regex: re_pipe, confidence: 0.80 },
    StatementPattern { id: "iso-date", regex: re_iso_date, confidence: 0.78 },
    StatementPattern { id: "month-name", regex: re_month_name, confidence: 0.75 },
    StatementPattern { id: "single-date", regex: re_single_date, confidence: 0.72 },
];

const HEADER_WORDS: &[&str] = &[
    "TRANSACTION", "DATE", "DESCRIPTION", "AMOUNT", "REFERENCE", "POST",
];

/// Parse raw text into candidate lines for the given statement kind.
pub fn parse(text: &str, kind: StatementKind, config: &ParserConfig) -> Vec<ExtractedLine> {
    match kind {
        StatementKind::Multi => parse_multi(text, config),
        StatementKind::Single => parse_single(text, config),
    }
}

// ── Multi-transaction statements ──────────────────────────────────────────────

fn parse_multi(text: &str, config: &ParserConfig) -> Vec<ExtractedLine> {
    let mut out = statement_lines(text, config);
    if out.is_empty() {
        out = column_fallback(text);
    }
    out
}

/// Run the pattern table over every line. Shared by both statement kinds:
/// a text classified `single` can still consist of one statement-shaped line.
fn statement_lines(text: &str, config: &ParserConfig) -> Vec<ExtractedLine> {
    let mut out = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.len() < 10 {
            continue;
        }
        let upper = line.to_uppercase();
        if is_header_line(&upper) || is_balance_line(&upper) {
            continue;
        }

        for pattern in STATEMENT_PATTERNS {
            let Some(caps) = (pattern.regex)().captures(line) else {
                continue;
            };
            // First match wins for this line, even if extraction then
            // rejects it (percent-shaped amount, unparseable date).
            if let Some(extracted) = extract_statement_line(&caps, pattern, config) {
                out.push(extracted);
            }
            break;
        }
    }

    out
}

fn extract_statement_line(
    caps: &regex::Captures<'_>,
    pattern: &StatementPattern,
    config: &ParserConfig,
) -> Option<ExtractedLine> {
    let date_token = match (config.date_column, caps.name("date2")) {
        (DateColumn::Posting, Some(second)) => second.as_str(),
        _ => caps.name("date")?.as_str(),
    };
    let date = scan::parse_date(date_token)?;
    let amount = scan::parse_amount(caps.name("amount")?.as_str())?;
    let description = scan::clean_description(caps.name("desc")?.as_str());
    if description.is_empty() {
        return None;
    }
    Some(ExtractedLine::new(
        Some(date),
        description,
        amount,
        SourceMethod::Regex(pattern.id.to_string()),
        pattern.confidence,
    ))
}

fn is_header_line(upper: &str) -> bool {
    HEADER_WORDS.iter().filter(|w| upper.contains(*w)).count() >= 2
}

fn is_balance_line(upper: &str) -> bool {
    upper.contains("TOTAL") || upper.contains("BALANCE")
}

/// Last-resort layout: OCR sometimes emits dates, descriptions, and amounts
/// as separate runs of lines. Pair them up positionally.
fn column_fallback(text: &str) -> Vec<ExtractedLine> {
    let mut dates = Vec::new();
    let mut amounts = Vec::new();
    let mut descriptions = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if re_date_only().is_match(line) {
            if let Some(d) = scan::parse_date(line) {
                dates.push(d);
            }
        } else if re_amount_only().is_match(line) {
            if let Some(a) = scan::parse_amount(line) {
                amounts.push(a);
            }
        } else if line.len() > 5 {
            let upper = line.to_uppercase();
            if !HEADER_WORDS.iter().any(|w| upper.contains(w))
                && !is_balance_line(&upper)
            {
                descriptions.push(scan::clean_description(line));
            }
        }
    }

    let count = descriptions.len().min(amounts.len());
    (0..count)
        .filter(|i| !descriptions[*i].is_empty())
        .map(|i| {
            let date = dates.get(i).or_else(|| dates.first()).copied();
            ExtractedLine::new(
                date,
                descriptions[i].clone(),
                amounts[i],
                SourceMethod::Regex("column-fallback".to_string()),
                0.50,
            )
        })
        .collect()
}

// ── Single receipts ───────────────────────────────────────────────────────────

fn parse_single(text: &str, config: &ParserConfig) -> Vec<ExtractedLine> {
    let date = find_first_date(text);
    let merchant = find_merchant(text);

    // A recognized total marker wins over any item lines.
    if let Some(caps) = scan::re_total_label().captures(text) {
        if let Some(amount) = caps.get(1).and_then(|m| scan::parse_amount(m.as_str())) {
            if let Some(merchant) = merchant {
                return vec![ExtractedLine::new(
                    date,
                    merchant,
                    amount,
                    SourceMethod::Regex("total-line".to_string()),
                    0.85,
                )];
            }
        }
    }

    // No total marker: sum the item list (`qty x unit` / `qty @ unit`).
    let item_sum: Option<rust_decimal::Decimal> = {
        let mut sum = rust_decimal::Decimal::ZERO;
        let mut seen = false;
        for line in text.lines() {
            if let Some(caps) = re_item_line().captures(line.trim()) {
                let qty = caps
                    .name("qty")
                    .and_then(|m| m.as_str().parse::<i64>().ok());
                let unit = caps.name("unit").and_then(|m| scan::parse_amount(m.as_str()));
                if let (Some(qty), Some(unit)) = (qty, unit) {
                    sum += rust_decimal::Decimal::from(qty) * unit;
                    seen = true;
                }
            }
        }
        seen.then_some(sum)
    };
    if let (Some(amount), Some(merchant)) = (item_sum, merchant.clone()) {
        return vec![ExtractedLine::new(
            date,
            merchant,
            amount,
            SourceMethod::Regex("item-sum".to_string()),
            0.60,
        )];
    }

    // Still nothing labeled: take the largest standalone dollar amount.
    let largest = scan::re_currency()
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| scan::parse_amount(m.as_str())))
        .max();
    if let (Some(amount), Some(merchant)) = (largest, merchant) {
        return vec![ExtractedLine::new(
            date,
            merchant,
            amount,
            SourceMethod::Regex("largest-amount".to_string()),
            0.55,
        )];
    }

    // Receipt heuristics found nothing; the text may still be a lone
    // statement-shaped line (a one-transaction upload reads as `single`).
    let mut lines = statement_lines(text, config);
    lines.truncate(1);
    lines
}

fn find_first_date(text: &str) -> Option<chrono::NaiveDate> {
    scan::re_date_token()
        .find_iter(text)
        .find_map(|m| scan::parse_date(m.as_str()))
}

/// Merchant heuristic: an early, reasonably long line that is not a phone
/// number, URL, date, amount, or boilerplate. All-caps lines win ties.
fn find_merchant(text: &str) -> Option<String> {
    text.lines()
        .take(10)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| l.len() >= 3 && l.len() <= 50)
        .filter(|l| !scan::re_phone().is_match(l))
        .filter(|l| !scan::re_url().is_match(l))
        .filter(|l| !scan::re_date_token().is_match(l))
        .filter(|l| !scan::re_amount_token().is_match(l))
        .filter(|l| !l.starts_with(|c: char| c.is_ascii_digit()))
        .filter(|l| {
            let u = l.to_uppercase();
            !u.contains("TOTAL")
                && !u.contains("RECEIPT")
                && !u.contains("INVOICE")
                && !u.contains("SUBTOTAL")
        })
        .max_by_key(|l| {
            let all_caps = l
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(|c| c.is_uppercase());
            (if all_caps { 2i32 } else { 0 }) + (l.len() as i32).min(20)
        })
        .map(|l| scan::clean_description(l))
        .filter(|m| !m.is_empty())
}
