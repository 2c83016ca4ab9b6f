use std::sync::OnceLock;

use regex::Regex;

fn re_store_suffix() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?:#\s*\d+|\bSTORE\s*\d+|\bNO\.?\s*\d+|\b\d{3,}\b)").unwrap()
    })
}

fn re_multi_space() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\s{2,}").unwrap())
}

/// Normalize a merchant string into its lookup key: upper-case, store-number
/// suffixes removed, whitespace collapsed. "STARBUCKS #4521" and
/// "Starbucks #0098" both become "STARBUCKS".
pub fn merchant_key(merchant: &str) -> String {
    let upper = merchant.trim().to_uppercase();
    let stripped = re_store_suffix().replace_all(&upper, " ");
    let collapsed = re_multi_space().replace_all(stripped.trim(), " ");
    collapsed.trim().to_string()
}
