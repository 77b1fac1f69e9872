//! Rarity tiers derived from empirical drop probability.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Rarity tier of an item, from how often it drops per unit opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Rarity {
    /// Below 5%.
    Common = 0,
    /// 5% and above.
    Uncommon = 1,
    /// 10% and above.
    Rare = 2,
    /// 20% and above.
    Epic = 3,
    /// 50% and above: drops nearly every time.
    Legendary = 4,
}

impl Rarity {
    /// Tier for a probability given in percent.
    #[must_use]
    pub fn from_percent(probability: f64) -> Self {
        if probability >= 50.0 {
            Self::Legendary
        } else if probability >= 20.0 {
            Self::Epic
        } else if probability >= 10.0 {
            Self::Rare
        } else if probability >= 5.0 {
            Self::Uncommon
        } else {
            Self::Common
        }
    }

    /// Lower probability bound of this tier, in percent.
    #[inline]
    #[must_use]
    pub const fn threshold_percent(self) -> f64 {
        match self {
            Self::Common => 0.0,
            Self::Uncommon => 5.0,
            Self::Rare => 10.0,
            Self::Epic => 20.0,
            Self::Legendary => 50.0,
        }
    }

    /// Lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
