//! # Model Availability Module
//!
//! Which models a resolved address actually serves, and what to ask for when
//! the requested one is missing.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ModelCache`] | Per-address listing cache with TTL (default 300 s) |
//! | [`select_model`] | Exact > [`FALLBACK_MODELS`] order > first available > requested |
//! | [`ModelChoice`] | How the chosen identifier was arrived at |
//!
//! ```rust
//! use resilient_llm_backend::models::{select_model, ModelChoice};
//!
//! let served = vec!["mistral:7b".to_string(), "phi3:mini".to_string()];
//! assert_eq!(
//!     select_model(&served, "llama3:70b"),
//!     ModelChoice::Fallback("phi3:mini".to_string())
//! );
//! ```

mod cache;
mod select;

pub use cache::{parse_tags, CacheStats, ModelCache, TAGS_PATH};
pub use select::{select_model, ModelChoice, FALLBACK_MODELS};
