//! Merchant category suggestions: a learned merchant-to-category map backed
//! by a pluggable store, with keyword heuristics as the cold-start fallback.

pub mod engine;
pub mod normalize;
pub mod store;

pub use engine::{Categorizer, CategorySuggestion, Confidence};
pub use normalize::merchant_key;
pub use store::{CategoryMapping, MappingStore, MemoryStore, StoreError};
