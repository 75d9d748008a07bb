//! Shared data models for tierup.
//!
//! This crate provides Serde-serializable types for:
//! - Progression categories (trader, web3)
//! - Tier definitions and validated tier tables
//! - Per-category experience point scores

pub mod category;
pub mod error;
pub mod tier;
pub mod xp;

// Re-export common types
pub use category::Category;
pub use error::{ModelError, ModelResult};
pub use tier::{next_tier, tier_for_xp, Tier, TierProgress, TierTable, TierTables};
pub use xp::XpScores;
