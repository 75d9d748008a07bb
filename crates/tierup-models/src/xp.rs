//! Per-category experience point scores.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Score map stored on a user profile under the `xp` field.
///
/// Fixed shape: every category is always present, defaulting to zero.
/// Scores are signed; nothing here clamps them at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct XpScores {
    #[serde(default)]
    pub trader: i64,
    #[serde(default)]
    pub web3: i64,
}

impl XpScores {
    pub fn new(trader: i64, web3: i64) -> Self {
        Self { trader, web3 }
    }

    pub fn get(&self, category: Category) -> i64 {
        match category {
            Category::Trader => self.trader,
            Category::Web3 => self.web3,
        }
    }

    pub fn set(&mut self, category: Category, value: i64) {
        match category {
            Category::Trader => self.trader = value,
            Category::Web3 => self.web3 = value,
        }
    }

    /// Copy with `amount` added to `category`. Other categories are untouched.
    pub fn with_added(&self, category: Category, amount: i64) -> Self {
        let mut next = *self;
        next.set(category, self.get(category).saturating_add(amount));
        next
    }

    /// `(category, score)` pairs in storage order.
    pub fn entries(&self) -> impl Iterator<Item = (Category, i64)> + '_ {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}
