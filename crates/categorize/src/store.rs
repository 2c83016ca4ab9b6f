use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One learned merchant-to-category association. The merchant key is the
/// sole identity; the confidence counter counts confirmations and only ever
/// grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub merchant_key: String,
    pub category: String,
    pub confidence: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mapping store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence seam for learned mappings. `upsert` must be atomic per key:
/// concurrent confirmations of the same merchant may not lose counter
/// increments, and repeated identical calls are idempotent in category.
pub trait MappingStore: Send + Sync {
    fn get(
        &self,
        merchant_key: &str,
    ) -> impl Future<Output = Result<Option<CategoryMapping>, StoreError>> + Send;

    /// Insert or confirm a mapping. A repeat confirmation of the same pair
    /// bumps the counter; a differing category overwrites the label but the
    /// counter keeps accumulating rather than resetting.
    fn upsert(
        &self,
        merchant_key: &str,
        category: &str,
    ) -> impl Future<Output = Result<CategoryMapping, StoreError>> + Send;
}

/// In-process store for tests and single-shot CLI use.
#[derive(Default)]
pub struct MemoryStore {
    mappings: Mutex<HashMap<String, CategoryMapping>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MappingStore for MemoryStore {
    async fn get(&self, merchant_key: &str) -> Result<Option<CategoryMapping>, StoreError> {
        let mappings = self
            .mappings
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(mappings.get(merchant_key).cloned())
    }

    async fn upsert(
        &self,
        merchant_key: &str,
        category: &str,
    ) -> Result<CategoryMapping, StoreError> {
        let mut mappings = self
            .mappings
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let entry = mappings
            .entry(merchant_key.to_string())
            .and_modify(|m| {
                m.category = category.to_string();
                m.confidence += 1;
            })
            .or_insert_with(|| CategoryMapping {
                merchant_key: merchant_key.to_string(),
                category: category.to_string(),
                confidence: 1,
            });
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("STARBUCKS").await.unwrap(), None);
    }

    #[tokio::test]
    async fn repeat_confirmations_accumulate() {
        let store = MemoryStore::new();
        let first = store.upsert("STARBUCKS", "Dining").await.unwrap();
        assert_eq!(first.confidence, 1);
        let second = store.upsert("STARBUCKS", "Dining").await.unwrap();
        assert_eq!(second.confidence, 2);
        assert_eq!(second.category, "Dining");
    }

    #[tokio::test]
    async fn differing_category_overwrites_but_keeps_counter() {
        let store = MemoryStore::new();
        store.upsert("COSTCO", "Shopping").await.unwrap();
        store.upsert("COSTCO", "Shopping").await.unwrap();
        let relabeled = store.upsert("COSTCO", "Groceries").await.unwrap();
        assert_eq!(relabeled.category, "Groceries");
        assert!(relabeled.confidence >= 1);
        assert_eq!(relabeled.confidence, 3);
    }
}
