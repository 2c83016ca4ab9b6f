use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

use folio_categorize::{CategoryMapping, MappingStore, StoreError};

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;
    info!("mapping database ready at {}", path.display());

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS merchant_categories (
            merchant_key TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            confidence INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Durable `MappingStore` over SQLite. Upserts are a single atomic statement
/// so concurrent confirmations of the same merchant never lose counter
/// increments.
pub struct SqliteMappingStore {
    pool: DbPool,
}

impl SqliteMappingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        Ok(Self::new(create_db(path).await?))
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl MappingStore for SqliteMappingStore {
    async fn get(&self, merchant_key: &str) -> Result<Option<CategoryMapping>, StoreError> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT merchant_key, category, confidence FROM merchant_categories WHERE merchant_key = ?1",
        )
        .bind(merchant_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(row.map(|(merchant_key, category, confidence)| CategoryMapping {
            merchant_key,
            category,
            confidence,
        }))
    }

    async fn upsert(
        &self,
        merchant_key: &str,
        category: &str,
    ) -> Result<CategoryMapping, StoreError> {
        let (merchant_key, category, confidence): (String, String, i64) = sqlx::query_as(
            r#"
            INSERT INTO merchant_categories (merchant_key, category)
            VALUES (?1, ?2)
            ON CONFLICT(merchant_key) DO UPDATE SET
                category = excluded.category,
                confidence = merchant_categories.confidence + 1,
                updated_at = datetime('now')
            RETURNING merchant_key, category, confidence
            "#,
        )
        .bind(merchant_key)
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(CategoryMapping {
            merchant_key,
            category,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_categorize::{Categorizer, Confidence};

    async fn test_store() -> (tempfile::TempDir, SqliteMappingStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMappingStore::open(&dir.path().join("test.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn get_on_fresh_db_is_none() {
        let (_dir, store) = test_store().await;
        assert!(store.get("STARBUCKS").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_inserts_then_increments() {
        let (_dir, store) = test_store().await;

        let first = store.upsert("STARBUCKS", "Dining").await.unwrap();
        assert_eq!(first.confidence, 1);
        assert_eq!(first.category, "Dining");

        let second = store.upsert("STARBUCKS", "Dining").await.unwrap();
        assert_eq!(second.confidence, 2);
        assert_eq!(second.category, "Dining");

        let fetched = store.get("STARBUCKS").await.unwrap().unwrap();
        assert_eq!(fetched.confidence, 2);
    }

    #[tokio::test]
    async fn relabel_keeps_counter_growing() {
        let (_dir, store) = test_store().await;
        store.upsert("COSTCO", "Shopping").await.unwrap();
        let relabeled = store.upsert("COSTCO", "Groceries").await.unwrap();
        assert_eq!(relabeled.category, "Groceries");
        assert_eq!(relabeled.confidence, 2);
    }

    #[tokio::test]
    async fn categorizer_learns_through_sqlite() {
        let (_dir, store) = test_store().await;
        let categorizer = Categorizer::new(store);

        categorizer.confirm("STARBUCKS #4521", "Coffee").await.unwrap();
        let suggestion = categorizer.suggest("Starbucks #0098").await;
        assert_eq!(suggestion.confidence, Confidence::Learned);
        assert_eq!(suggestion.category.as_deref(), Some("Coffee"));
    }
}
