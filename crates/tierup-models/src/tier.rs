//! Tier definitions and XP-to-tier lookups.
//!
//! A [`TierTable`] is an ordered, non-empty list of tiers sorted ascending by
//! their lower bound (`xp_from`). Tables are validated on construction so the
//! lookups below never see an unsorted sequence.

use std::sync::OnceLock;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::{ModelError, ModelResult};

/// A named band of XP scores starting at `xp_from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    /// Stable identifier (e.g. "silver").
    pub id: String,
    /// Display name.
    pub name: String,
    /// Inclusive lower bound.
    pub xp_from: i64,
}

impl Tier {
    pub fn new(id: impl Into<String>, name: impl Into<String>, xp_from: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            xp_from,
        }
    }
}

/// Non-empty tier sequence, strictly ascending by `xp_from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Tier>", into = "Vec<Tier>")]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    /// Build a table, rejecting empty or unsorted input.
    pub fn new(tiers: Vec<Tier>) -> ModelResult<Self> {
        if tiers.is_empty() {
            return Err(ModelError::EmptyTierTable);
        }

        for pair in tiers.windows(2) {
            if pair[1].xp_from <= pair[0].xp_from {
                return Err(ModelError::UnsortedTierTable {
                    previous: pair[0].name.clone(),
                    previous_from: pair[0].xp_from,
                    current: pair[1].name.clone(),
                    current_from: pair[1].xp_from,
                });
            }
        }

        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Lowest tier. Its bound is the floor of the table.
    pub fn first(&self) -> &Tier {
        &self.tiers[0]
    }

    /// Highest tier.
    pub fn last(&self) -> &Tier {
        &self.tiers[self.tiers.len() - 1]
    }

    /// Number of tiers whose lower bound is <= `score`.
    fn qualifying(&self, score: i64) -> usize {
        self.tiers.partition_point(|t| t.xp_from <= score)
    }

    /// Highest tier whose lower bound is <= `score`.
    ///
    /// Scores below every bound map to the first tier.
    pub fn tier_for_xp(&self, score: i64) -> &Tier {
        match self.qualifying(score) {
            0 => self.first(),
            n => &self.tiers[n - 1],
        }
    }

    /// First tier whose lower bound exceeds `score`, or `None` at the top tier.
    pub fn next_tier(&self, score: i64) -> Option<&Tier> {
        self.tiers.get(self.qualifying(score))
    }

    /// Current tier plus distance to the next one.
    pub fn progress(&self, score: i64) -> TierProgress {
        let current = self.tier_for_xp(score).clone();
        let next = self.next_tier(score).cloned();

        TierProgress {
            xp: score,
            xp_into_tier: score.saturating_sub(current.xp_from).max(0),
            xp_to_next: next.as_ref().map(|n| n.xp_from.saturating_sub(score)),
            current,
            next,
        }
    }
}

impl TryFrom<Vec<Tier>> for TierTable {
    type Error = ModelError;

    fn try_from(tiers: Vec<Tier>) -> Result<Self, Self::Error> {
        Self::new(tiers)
    }
}

impl From<TierTable> for Vec<Tier> {
    fn from(table: TierTable) -> Self {
        table.tiers
    }
}

/// Where a score sits within its tier table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TierProgress {
    pub xp: i64,
    pub current: Tier,
    pub next: Option<Tier>,
    pub xp_into_tier: i64,
    /// `None` when already at the highest tier.
    pub xp_to_next: Option<i64>,
}

impl TierProgress {
    /// Fraction of the way from the current tier to the next (1.0 at the top tier).
    pub fn fraction(&self) -> f64 {
        match &self.next {
            Some(next) => {
                let span = next.xp_from - self.current.xp_from;
                if span <= 0 {
                    return 1.0;
                }
                (self.xp_into_tier as f64 / span as f64).clamp(0.0, 1.0)
            }
            None => 1.0,
        }
    }
}

/// One tier table per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTables {
    pub trader: TierTable,
    pub web3: TierTable,
}

impl TierTables {
    pub fn new(trader: TierTable, web3: TierTable) -> Self {
        Self { trader, web3 }
    }

    pub fn for_category(&self, category: Category) -> &TierTable {
        match category {
            Category::Trader => &self.trader,
            Category::Web3 => &self.web3,
        }
    }

    pub fn tier_for_xp(&self, category: Category, score: i64) -> &Tier {
        self.for_category(category).tier_for_xp(score)
    }

    pub fn next_tier(&self, category: Category, score: i64) -> Option<&Tier> {
        self.for_category(category).next_tier(score)
    }

    pub fn progress(&self, category: Category, score: i64) -> TierProgress {
        self.for_category(category).progress(score)
    }
}

impl Default for TierTables {
    fn default() -> Self {
        builtin_tables().clone()
    }
}

fn builtin_tables() -> &'static TierTables {
    static TABLES: OnceLock<TierTables> = OnceLock::new();
    TABLES.get_or_init(|| TierTables {
        trader: TierTable {
            tiers: vec![
                Tier::new("bronze", "Bronze", 0),
                Tier::new("silver", "Silver", 100),
                Tier::new("gold", "Gold", 500),
                Tier::new("platinum", "Platinum", 2000),
                Tier::new("diamond", "Diamond", 5000),
            ],
        },
        web3: TierTable {
            tiers: vec![
                Tier::new("newcomer", "Newcomer", 0),
                Tier::new("explorer", "Explorer", 100),
                Tier::new("builder", "Builder", 500),
                Tier::new("architect", "Architect", 2000),
                Tier::new("pioneer", "Pioneer", 5000),
            ],
        },
    })
}

/// Tier for `score` in the built-in table of `category`.
pub fn tier_for_xp(category: Category, score: i64) -> &'static Tier {
    builtin_tables().tier_for_xp(category, score)
}

/// Next tier above `score` in the built-in table of `category`.
pub fn next_tier(category: Category, score: i64) -> Option<&'static Tier> {
    builtin_tables().next_tier(category, score)
}
