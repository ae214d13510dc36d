//! Match-quality classification between two offers.

use serde::{Deserialize, Serialize};

use crate::{Offer, constants};

/// Compatibility tier of two offers, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchTier {
    /// Each side wants something the other offers.
    Perfect,
    /// Exactly one side wants something the other offers.
    Interest,
    /// No direct interest, but both mention a shared category keyword.
    Keyword,
    /// Not compatible; no action is taken.
    None,
}

impl MatchTier {
    /// Compatibility score: 100, 75, 50, or 0 for [`MatchTier::None`].
    #[must_use]
    pub fn score(self) -> u8 {
        match self {
            Self::Perfect => constants::PERFECT_SCORE,
            Self::Interest => constants::INTEREST_SCORE,
            Self::Keyword => constants::KEYWORD_SCORE,
            Self::None => 0,
        }
    }

    #[must_use]
    pub fn is_match(self) -> bool {
        self != Self::None
    }
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Perfect => write!(f, "PERFECT"),
            Self::Interest => write!(f, "INTEREST"),
            Self::Keyword => write!(f, "KEYWORD"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// A compatible existing offer found for a new submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Snapshot of the candidate offer at match time.
    pub offer: Offer,
    pub tier: MatchTier,
    pub score: u8,
}

impl Match {
    #[must_use]
    pub fn new(offer: Offer, tier: MatchTier) -> Self {
        Self {
            offer,
            tier,
            score: tier.score(),
        }
    }
}
