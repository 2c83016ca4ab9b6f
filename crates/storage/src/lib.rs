//! SQLite persistence for learned merchant-to-category mappings.

pub mod db;

pub use db::{create_db, DbPool, SqliteMappingStore};
