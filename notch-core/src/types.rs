//! Core types shared across Notch crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Unique user identifier.
pub type Fid = u64;

/// An axis of scored activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum Category {
    Builder,
    Social,
    Degen,
    Player,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 4] = [
        Category::Builder,
        Category::Social,
        Category::Degen,
        Category::Player,
    ];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Builder => "Builder",
            Category::Social => "Social",
            Category::Degen => "Degen",
            Category::Player => "Player",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownCategory(s.to_string()))
    }
}

/// Ordered rank tier derived from a score.
///
/// Ordering follows the ladder: `Mini < Core < Plus < Pro < ProMax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum Rank {
    Mini = 0,
    Core = 1,
    Plus = 2,
    Pro = 3,
    ProMax = 4,
}

impl Rank {
    /// All tiers, lowest first.
    pub const ALL: [Rank; 5] = [Rank::Mini, Rank::Core, Rank::Plus, Rank::Pro, Rank::ProMax];

    /// Minimum score required to hold this rank.
    pub fn threshold(&self) -> u64 {
        match self {
            Rank::Mini => 0,
            Rank::Core => 100,
            Rank::Plus => 500,
            Rank::Pro => 1000,
            Rank::ProMax => 2500,
        }
    }

    /// The next tier up, or `None` at the top of the ladder.
    pub fn next(&self) -> Option<Rank> {
        match self {
            Rank::Mini => Some(Rank::Core),
            Rank::Core => Some(Rank::Plus),
            Rank::Plus => Some(Rank::Pro),
            Rank::Pro => Some(Rank::ProMax),
            Rank::ProMax => None,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Mini => "Mini",
            Rank::Core => "Core",
            Rank::Plus => "Plus",
            Rank::Pro => "Pro",
            Rank::ProMax => "ProMax",
        }
    }
}

impl Default for Rank {
    fn default() -> Self {
        Self::Mini
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rank::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownRank(s.to_string()))
    }
}

/// Error types for domain rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Category name not recognised
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// Rank name not recognised
    #[error("Unknown rank: {0}")]
    UnknownRank(String),

    /// Adding points would overflow the score counter
    #[error("Score overflow for fid {fid}")]
    ScoreOverflow { fid: Fid },

    /// A score record broke one of its derived-field invariants
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!("builder".parse::<Category>().unwrap(), Category::Builder);
        assert_eq!("Social".parse::<Category>().unwrap(), Category::Social);
        assert!(matches!(
            "Gamer".parse::<Category>(),
            Err(CoreError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_rank_ordering() {
        assert!(Rank::Mini < Rank::Core);
        assert!(Rank::Pro < Rank::ProMax);
        assert_eq!(Rank::ProMax.next(), None);
        assert_eq!(Rank::Plus.next(), Some(Rank::Pro));
    }

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&Category::Degen).unwrap();
        assert_eq!(json, "\"Degen\"");
        let rank: Rank = serde_json::from_str("\"ProMax\"").unwrap();
        assert_eq!(rank, Rank::ProMax);
    }
}
