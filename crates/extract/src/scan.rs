//! Shared token scanners: amount and date parsing plus description cleanup.
//! Every parser and the statement detector lean on these, so behavior here
//! is deliberately deterministic and constant-driven.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        pub(crate) fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| {
                let pat: String = $pat.into();
                regex::Regex::new(&pat).expect("invalid regex")
            })
        }
    };
}
pub(crate) use re;

/// Amount token shape shared by the statement patterns: optional parens,
/// currency sign, thousands separators, trailing minus / CR credit marker.
/// A trailing `%` is captured on purpose so percentages can be rejected
/// after the fact (the regex crate has no lookahead).
pub(crate) const AMOUNT_TOKEN: &str = r"\(?\$?\s?-?[\d,]+\.\d{2}\)?-?(?:\s?CR)?%?";

re!(re_date_token,
    r"(?i)\b(?:\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}[/-]\d{1,2}[/-]\d{1,2}|(?:january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|oct|nov|dec)\.?\s+\d{1,2},?\s+\d{4})\b");
re!(re_amount_token, format!(r"{AMOUNT_TOKEN}"));
re!(re_phone, r"\(?\d{3}\)?[\s\-.]\d{3}[\s\-.]\d{4}");
re!(re_url, r"(?i)(https?://|www\.)\S+");
re!(re_total_label,
    r"(?i)\b(?:grand\s+total|amount\s+due|balance\s+due|total\s+due|total)\s*[:\$]?\s*(\(?\$?\s?-?[\d,]+\.\d{2}\)?-?(?:\s?CR)?)");
re!(re_currency, r"\$\s*([\d,]+\.\d{2})");

re!(re_desc_prefix, r"(?i)^(?:purchase|payment|debit|credit)\s+");
re!(re_post_then_date,
    r"(?i)\bpost(?:ed)?\s*\d{1,2}\s*[/-]\s*\d{1,2}(?:\s*[/-]\s*\d{2,4})?");
re!(re_date_then_post,
    r"(?i)\d{1,2}\s*[/-]\s*\d{1,2}(?:\s*[/-]\s*\d{2,4})?\s+post(?:ed)?\b");
re!(re_trailing_date, r"\s+\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?\s*$");
re!(re_bare_post, r"(?i)\bpost(?:ed)?\b");
re!(re_multi_space, r"\s+");

const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y", "%m/%d/%Y", "%m-%d-%y", "%m-%d-%Y",
    "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%Y/%m/%d",
    "%B %d, %Y", "%b %d, %Y", "%B %d %Y", "%b %d %Y",
];

/// Parse a date token against the supported format ladder, US forms first.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let token = re_multi_space().replace_all(raw.trim(), " ");
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&token, fmt).ok())
}

/// Parse an amount token into an exact decimal. Returns `None` for tokens
/// that are percentages or phone-number-shaped, and for anything that does
/// not reduce to `digits.dd`. Negative notation accepted: leading minus,
/// parentheses, trailing minus, and a `CR` credit suffix.
pub(crate) fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.contains('%') || re_phone().is_match(s) {
        return None;
    }

    let mut negative = false;
    let mut t = s.to_uppercase();
    if let Some(stripped) = t.strip_suffix("CR") {
        negative = true;
        t = stripped.trim().to_string();
    }
    if t.starts_with('(') && t.ends_with(')') {
        negative = true;
        t = t[1..t.len() - 1].to_string();
    }
    if let Some(stripped) = t.strip_suffix('-') {
        negative = true;
        t = stripped.to_string();
    }
    if let Some(stripped) = t.strip_prefix('-') {
        negative = true;
        t = stripped.to_string();
    }
    let t: String = t
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if t.strip_prefix('-').is_some() {
        // A second minus after parens/CR handling means garbage input.
        return None;
    }

    // Exactly two decimal places, nothing else.
    let (int_part, frac_part) = t.split_once('.')?;
    if int_part.is_empty()
        || frac_part.len() != 2
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let value = Decimal::from_str(&t).ok()?;
    Some(if negative { -value } else { value })
}

/// Normalize a merchant/description fragment: drop posting-date leftovers
/// and transaction-type prefixes, collapse internal whitespace.
pub(crate) fn clean_description(raw: &str) -> String {
    let mut d = raw.trim().to_string();
    d = re_desc_prefix().replace(&d, "").into_owned();
    d = re_post_then_date().replace_all(&d, "").into_owned();
    d = re_date_then_post().replace_all(&d, "").into_owned();
    d = re_trailing_date().replace(&d, "").into_owned();
    d = re_bare_post().replace_all(&d, "").into_owned();
    re_multi_space().replace_all(&d, " ").trim().to_string()
}
