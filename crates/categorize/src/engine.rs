use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::normalize::merchant_key;
use crate::store::{CategoryMapping, MappingStore, StoreError};

/// Confidence tier of a suggestion: `learned` comes from the mapping store,
/// `heuristic` from the keyword table, `none` means no opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Learned,
    Heuristic,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySuggestion {
    pub merchant: String,
    pub category: Option<String>,
    pub confidence: Confidence,
}

/// Keyword defaults for merchants the store has never seen. Evaluated in
/// order, first hit wins, so specific merchant names sit above generic words.
const KEYWORD_RULES: &[(&str, &str)] = &[
    ("STARBUCKS", "Dining"),
    ("MCDONALD", "Dining"),
    ("CHIPOTLE", "Dining"),
    ("UBER EATS", "Dining"),
    ("DOORDASH", "Dining"),
    ("UBER", "Transport"),
    ("LYFT", "Transport"),
    ("PARKING", "Transport"),
    ("TRANSIT", "Transport"),
    ("SHELL", "Fuel"),
    ("CHEVRON", "Fuel"),
    ("EXXON", "Fuel"),
    ("AMAZON", "Shopping"),
    ("TARGET", "Shopping"),
    ("WALMART", "Shopping"),
    ("NETFLIX", "Subscriptions"),
    ("SPOTIFY", "Subscriptions"),
    ("HULU", "Subscriptions"),
    ("KROGER", "Groceries"),
    ("WHOLE FOODS", "Groceries"),
    ("TRADER JOE", "Groceries"),
    ("SAFEWAY", "Groceries"),
    ("DELTA", "Travel"),
    ("AIRLINES", "Travel"),
    ("MARRIOTT", "Travel"),
    ("HILTON", "Travel"),
    ("AIRBNB", "Travel"),
    ("CVS", "Health"),
    ("WALGREENS", "Health"),
    ("PHARMACY", "Health"),
    ("RENT", "Housing"),
    ("LEASE", "Housing"),
    ("MORTGAGE", "Housing"),
    ("COFFEE", "Dining"),
    ("RESTAURANT", "Dining"),
    ("PIZZA", "Dining"),
    ("DELI", "Dining"),
    ("HOTEL", "Travel"),
    ("GROCERY", "Groceries"),
    ("MARKET", "Groceries"),
    ("FUEL", "Fuel"),
    ("SUBSCRIPTION", "Subscriptions"),
];

fn heuristic_category(key: &str) -> Option<&'static str> {
    KEYWORD_RULES
        .iter()
        .find(|(keyword, _)| key.contains(keyword))
        .map(|(_, category)| *category)
}

/// Suggests a category per merchant string and learns from confirmations.
/// Store failures degrade to the heuristic tier rather than failing the
/// suggestion; only `confirm` surfaces store errors, since a lost write is
/// something the caller should know about.
pub struct Categorizer<S: MappingStore> {
    store: S,
}

impl<S: MappingStore> Categorizer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn suggest(&self, merchant: &str) -> CategorySuggestion {
        let key = merchant_key(merchant);
        if key.is_empty() {
            return CategorySuggestion {
                merchant: merchant.to_string(),
                category: None,
                confidence: Confidence::None,
            };
        }

        match self.store.get(&key).await {
            Ok(Some(mapping)) => {
                return CategorySuggestion {
                    merchant: merchant.to_string(),
                    category: Some(mapping.category),
                    confidence: Confidence::Learned,
                };
            }
            Ok(None) => {}
            Err(e) => warn!("mapping store lookup failed for '{key}': {e}"),
        }

        match heuristic_category(&key) {
            Some(category) => CategorySuggestion {
                merchant: merchant.to_string(),
                category: Some(category.to_string()),
                confidence: Confidence::Heuristic,
            },
            None => CategorySuggestion {
                merchant: merchant.to_string(),
                category: None,
                confidence: Confidence::None,
            },
        }
    }

    pub async fn suggest_all(&self, merchants: &[String]) -> Vec<CategorySuggestion> {
        let mut out = Vec::with_capacity(merchants.len());
        for merchant in merchants {
            out.push(self.suggest(merchant).await);
        }
        out
    }

    /// Record a user-confirmed (merchant, category) pair.
    pub async fn confirm(
        &self,
        merchant: &str,
        category: &str,
    ) -> Result<CategoryMapping, StoreError> {
        let key = merchant_key(merchant);
        if key.is_empty() {
            return Err(StoreError::Unavailable("empty merchant key".into()));
        }
        self.store.upsert(&key, category).await
    }
}
