//! XP awards.
//!
//! # Known race
//!
//! [`XpService::add_xp`] is a plain read-modify-write: fetch the score map,
//! add locally, write the whole map back. Two concurrent awards for the same
//! user can both read the same starting value, and the later write then
//! discards the earlier increment (lost update). There is no transaction,
//! precondition or retry. See `test_concurrent_awards_lose_an_update`.

use std::sync::Arc;

use tracing::{debug, info};

use tierup_models::{Category, TierProgress, TierTables, XpScores};

use crate::error::XpResult;
use crate::store::ProfileStore;

/// Counter of XP gained through positive awards, labeled by category.
pub const XP_AWARDED_TOTAL: &str = "xp_awarded_total";

/// Counter of XP removed through negative awards, labeled by category.
pub const XP_DEDUCTED_TOTAL: &str = "xp_deducted_total";

/// Tier status of one category for a user.
#[derive(Debug, Clone)]
pub struct TierStatus {
    pub category: Category,
    pub progress: TierProgress,
}

/// XP operations over a [`ProfileStore`].
#[derive(Clone)]
pub struct XpService {
    store: Arc<dyn ProfileStore>,
    tables: TierTables,
}

impl XpService {
    /// Service using the built-in tier tables.
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self::with_tables(store, TierTables::default())
    }

    pub fn with_tables(store: Arc<dyn ProfileStore>, tables: TierTables) -> Self {
        Self { store, tables }
    }

    pub fn tables(&self) -> &TierTables {
        &self.tables
    }

    /// Current scores; a missing profile or `xp` field reads as all zeros.
    pub async fn get_xp(&self, user_id: &str) -> XpResult<XpScores> {
        Ok(self.store.fetch_xp(user_id).await?.unwrap_or_default())
    }

    /// Add `amount` (may be negative) to one category and write the map back.
    ///
    /// Returns the scores that were written. Store failures from either the
    /// read or the write are returned unchanged; nothing is retried.
    ///
    /// Not atomic. Concurrent calls for the same user can lose updates.
    pub async fn add_xp(
        &self,
        user_id: &str,
        category: Category,
        amount: i64,
    ) -> XpResult<XpScores> {
        let current = match self.store.fetch_xp(user_id).await? {
            Some(scores) => scores,
            None => {
                debug!(user_id = %user_id, "No XP recorded yet, starting from zero");
                XpScores::default()
            }
        };

        let updated = current.with_added(category, amount);
        self.store.write_xp(user_id, &updated).await?;

        record_xp_change(category, amount);

        info!(
            user_id = %user_id,
            category = %category,
            amount = amount,
            before = current.get(category),
            after = updated.get(category),
            "XP awarded"
        );

        Ok(updated)
    }

    /// Tier progress for every category.
    pub async fn tier_status(&self, user_id: &str) -> XpResult<Vec<TierStatus>> {
        let scores = self.get_xp(user_id).await?;
        Ok(scores
            .entries()
            .map(|(category, score)| TierStatus {
                category,
                progress: self.tables.progress(category, score),
            })
            .collect())
    }
}

fn record_xp_change(category: Category, amount: i64) {
    let name = match amount.signum() {
        1 => XP_AWARDED_TOTAL,
        -1 => XP_DEDUCTED_TOTAL,
        _ => return,
    };
    metrics::counter!(name, "category" => category.as_str()).increment(amount.unsigned_abs());
}
