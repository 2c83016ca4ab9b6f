//! Statement type detection: does this text describe one receipt or a
//! multi-transaction statement?

use std::collections::HashSet;

use folio_core::StatementKind;

use crate::scan;

/// Count independent (date, amount) pairs on distinct lines. More than one
/// pair implies a statement; otherwise a single receipt. Ambiguous documents
/// (a receipt whose subtotal and tax read as two amounts) stay `Single`
/// unless at least two distinct description tokens back the split, which
/// keeps one receipt from shattering into phantom transactions.
pub fn detect(text: &str) -> StatementKind {
    let mut pairs = 0usize;
    let mut descriptions: HashSet<String> = HashSet::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let has_date = scan::re_date_token().is_match(line);
        let has_amount = scan::re_amount_token()
            .find_iter(line)
            .any(|m| scan::parse_amount(m.as_str()).is_some());
        if !(has_date && has_amount) {
            continue;
        }
        pairs += 1;

        // What remains after removing date and amount tokens is the
        // description candidate for this pair.
        let stripped = scan::re_date_token().replace_all(line, " ");
        let stripped = scan::re_amount_token().replace_all(&stripped, " ");
        let description = scan::clean_description(&stripped).to_uppercase();
        if description.len() >= 3 {
            descriptions.insert(description);
        }
    }

    if pairs > 1 && descriptions.len() >= 2 {
        StatementKind::Multi
    } else {
        StatementKind::Single
    }
}
