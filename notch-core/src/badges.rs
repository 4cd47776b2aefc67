//! Badge catalog.
//!
//! Badges are declared statically per category. Each carries a requirement
//! predicate evaluated against a user's activity aggregates; the evaluator
//! itself lives in the engine crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::types::{Category, Fid, Rank};

/// What a user must have done to earn a badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BadgeRequirement {
    /// At least `threshold` activity-log entries of `activity_type`
    /// within the badge's category.
    ActivityCount {
        activity_type: &'static str,
        threshold: u64,
    },
    /// At least `threshold` distinct completed tasks.
    QuestCount { threshold: u64 },
}

impl BadgeRequirement {
    /// Evaluate against per-type activity counts and the completed-task count.
    pub fn is_met(&self, activity_counts: &HashMap<String, u64>, completed_tasks: u64) -> bool {
        match self {
            BadgeRequirement::ActivityCount {
                activity_type,
                threshold,
            } => activity_counts.get(*activity_type).copied().unwrap_or(0) >= *threshold,
            BadgeRequirement::QuestCount { threshold } => completed_tasks >= *threshold,
        }
    }
}

/// Static badge declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    /// Tier label the badge is associated with
    pub rank: Rank,
    pub requirement: BadgeRequirement,
    pub image_url: &'static str,
}

impl BadgeDefinition {
    /// Build the earned record for `fid`.
    pub fn award(&self, fid: Fid, earned_at: DateTime<Utc>) -> Badge {
        Badge {
            fid,
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            category: self.category,
            rank: self.rank,
            image_url: self.image_url.to_string(),
            earned_at,
        }
    }
}

const fn activity(activity_type: &'static str, threshold: u64) -> BadgeRequirement {
    BadgeRequirement::ActivityCount {
        activity_type,
        threshold,
    }
}

/// Every badge, grouped by category in display order.
pub static BADGES: &[BadgeDefinition] = &[
    BadgeDefinition {
        id: "first-deploy",
        name: "First Deploy",
        description: "Deploy your first smart contract",
        category: Category::Builder,
        rank: Rank::Core,
        requirement: activity("deploy", 1),
        image_url: "/badges/builder-first-deploy.png",
    },
    BadgeDefinition {
        id: "code-contributor",
        name: "Code Contributor",
        description: "Contribute to 5 different projects",
        category: Category::Builder,
        rank: Rank::Plus,
        requirement: activity("contribute", 5),
        image_url: "/badges/builder-contributor.png",
    },
    BadgeDefinition {
        id: "senior-builder",
        name: "Senior Builder",
        description: "Deploy 10 smart contracts",
        category: Category::Builder,
        rank: Rank::Pro,
        requirement: activity("deploy", 10),
        image_url: "/badges/builder-senior.png",
    },
    BadgeDefinition {
        id: "first-cast",
        name: "First Cast",
        description: "Publish your first cast",
        category: Category::Social,
        rank: Rank::Core,
        requirement: activity("publish", 1),
        image_url: "/badges/social-first-cast.png",
    },
    BadgeDefinition {
        id: "community-builder",
        name: "Community Builder",
        description: "Publish 50 casts",
        category: Category::Social,
        rank: Rank::Plus,
        requirement: activity("publish", 50),
        image_url: "/badges/social-community.png",
    },
    BadgeDefinition {
        id: "influencer",
        name: "Influencer",
        description: "Publish 200 casts",
        category: Category::Social,
        rank: Rank::Pro,
        requirement: activity("publish", 200),
        image_url: "/badges/social-influencer.png",
    },
    BadgeDefinition {
        id: "first-swap",
        name: "First Swap",
        description: "Execute your first token swap",
        category: Category::Degen,
        rank: Rank::Core,
        requirement: activity("swap", 1),
        image_url: "/badges/degen-first-swap.png",
    },
    BadgeDefinition {
        id: "active-trader",
        name: "Active Trader",
        description: "Execute 25 swaps",
        category: Category::Degen,
        rank: Rank::Plus,
        requirement: activity("swap", 25),
        image_url: "/badges/degen-trader.png",
    },
    BadgeDefinition {
        id: "whale",
        name: "Whale",
        description: "Execute 100 swaps",
        category: Category::Degen,
        rank: Rank::Pro,
        requirement: activity("swap", 100),
        image_url: "/badges/degen-whale.png",
    },
    BadgeDefinition {
        id: "first-quest",
        name: "First Quest",
        description: "Complete your first quest",
        category: Category::Player,
        rank: Rank::Core,
        requirement: BadgeRequirement::QuestCount { threshold: 1 },
        image_url: "/badges/player-first-quest.png",
    },
    BadgeDefinition {
        id: "quest-master",
        name: "Quest Master",
        description: "Complete 20 quests",
        category: Category::Player,
        rank: Rank::Plus,
        requirement: BadgeRequirement::QuestCount { threshold: 20 },
        image_url: "/badges/player-master.png",
    },
    BadgeDefinition {
        id: "legendary-player",
        name: "Legendary Player",
        description: "Complete 100 quests",
        category: Category::Player,
        rank: Rank::Pro,
        requirement: BadgeRequirement::QuestCount { threshold: 100 },
        image_url: "/badges/player-legendary.png",
    },
];

/// Badges declared for one category.
pub fn badges_for(category: Category) -> impl Iterator<Item = &'static BadgeDefinition> {
    BADGES.iter().filter(move |b| b.category == category)
}

/// An earned badge. At most one per `(fid, id)`; never revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub fid: Fid,
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub rank: Rank,
    pub image_url: String,
    pub earned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_shape() {
        for category in Category::ALL {
            assert_eq!(badges_for(category).count(), 3, "{category}");
        }
        let ids: HashSet<_> = BADGES.iter().map(|b| b.id).collect();
        assert_eq!(ids.len(), BADGES.len());
    }

    #[test]
    fn test_activity_requirement() {
        let req = activity("swap", 25);
        let mut counts = HashMap::new();
        counts.insert("swap".to_string(), 24);
        assert!(!req.is_met(&counts, 0));
        counts.insert("swap".to_string(), 25);
        assert!(req.is_met(&counts, 0));
        assert!(!req.is_met(&HashMap::new(), 100));
    }

    #[test]
    fn test_quest_requirement() {
        let req = BadgeRequirement::QuestCount { threshold: 20 };
        assert!(!req.is_met(&HashMap::new(), 19));
        assert!(req.is_met(&HashMap::new(), 20));
    }

    #[test]
    fn test_award_copies_definition() {
        let def = &BADGES[0];
        let now = Utc::now();
        let badge = def.award(42, now);
        assert_eq!(badge.id, "first-deploy");
        assert_eq!(badge.fid, 42);
        assert_eq!(badge.rank, Rank::Core);
        assert_eq!(badge.earned_at, now);
    }
}
