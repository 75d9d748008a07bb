//! Remote profile store abstraction.

use async_trait::async_trait;
use tierup_models::XpScores;

use crate::error::XpResult;

/// Field on the profile record that holds the score map.
pub const XP_FIELD: &str = "xp";

/// Read and write the `xp` field of a user profile, keyed by user ID.
///
/// Implementations make no atomicity promise across a `fetch_xp` followed by
/// a `write_xp`; each call is an independent round trip.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Score map of the profile, or `None` when the record or its `xp`
    /// field is absent.
    async fn fetch_xp(&self, user_id: &str) -> XpResult<Option<XpScores>>;

    /// Replace the `xp` field of the profile. Other fields are untouched.
    async fn write_xp(&self, user_id: &str, scores: &XpScores) -> XpResult<()>;
}
