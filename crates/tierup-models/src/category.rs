//! Progression categories.

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Independent progression track. Each category has its own score and tier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Trader,
    Web3,
}

impl Category {
    /// All categories, in storage order.
    pub const ALL: [Category; 2] = [Category::Trader, Category::Web3];

    /// Field name used in stored score maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Trader => "trader",
            Category::Web3 => "web3",
        }
    }
}

impl FromStr for Category {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trader" => Ok(Category::Trader),
            "web3" => Ok(Category::Web3),
            _ => Err(ModelError::UnknownCategory(s.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
