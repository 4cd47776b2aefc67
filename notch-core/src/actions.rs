//! Point-earning actions and their cooldowns.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Category;

/// How often an action may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cooldown {
    None,
    /// Once per UTC calendar day
    Daily,
    /// Once per rolling seven days
    Weekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub id: &'static str,
    /// Activity type written to the log
    pub activity_type: &'static str,
    pub category: Category,
    pub points: u64,
    pub description: &'static str,
    pub cooldown: Cooldown,
}

impl ActionDefinition {
    /// Whether the action may be performed at `now` given when it was last done.
    pub fn can_perform(&self, last_performed: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last) = last_performed else {
            return true;
        };
        match self.cooldown {
            Cooldown::None => true,
            Cooldown::Daily => now.date_naive() != last.date_naive(),
            Cooldown::Weekly => now >= last + Duration::days(7),
        }
    }
}

macro_rules! action {
    ($id:literal, $ty:literal, $cat:ident, $points:literal, $desc:literal, $cd:ident) => {
        ActionDefinition {
            id: $id,
            activity_type: $ty,
            category: Category::$cat,
            points: $points,
            description: $desc,
            cooldown: Cooldown::$cd,
        }
    };
}

pub static ACTIONS: &[ActionDefinition] = &[
    action!("deploy-contract", "deploy", Builder, 100, "Deploy a smart contract", Weekly),
    action!("contribute-code", "contribute", Builder, 25, "Contribute code to a project", Daily),
    action!("review-pr", "review", Builder, 15, "Review a pull request", Daily),
    action!("publish-cast", "publish", Social, 10, "Publish a cast", Daily),
    action!("interact-cast", "interact", Social, 5, "Like or recast a cast", Daily),
    action!("reply-cast", "reply", Social, 8, "Reply to a cast", Daily),
    action!("swap-tokens", "swap", Degen, 20, "Swap tokens", Daily),
    action!("mint-nft", "mint", Degen, 50, "Mint an NFT", Weekly),
    action!("stake-tokens", "stake", Degen, 30, "Stake tokens", Weekly),
    action!("use-miniapp", "miniapp", Player, 15, "Use another miniapp", Daily),
    action!("complete-quest", "quest", Player, 25, "Complete a quest", Weekly),
    action!("invite-friend", "invite", Player, 40, "Invite a friend", Weekly),
];

/// Look up an action by id.
pub fn find_action(id: &str) -> Option<&'static ActionDefinition> {
    ACTIONS.iter().find(|a| a.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daily_cooldown_is_calendar_based() {
        let action = find_action("publish-cast").unwrap();
        let late = Utc.with_ymd_and_hms(2025, 9, 1, 23, 50, 0).unwrap();
        let same_day = Utc.with_ymd_and_hms(2025, 9, 1, 23, 59, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2025, 9, 2, 0, 5, 0).unwrap();

        assert!(action.can_perform(None, late));
        assert!(!action.can_perform(Some(late), same_day));
        assert!(action.can_perform(Some(late), next_day));
    }

    #[test]
    fn test_weekly_cooldown_is_rolling() {
        let action = find_action("mint-nft").unwrap();
        let last = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
        assert!(!action.can_perform(Some(last), last + Duration::days(6)));
        assert!(action.can_perform(Some(last), last + Duration::days(7)));
    }

    #[test]
    fn test_catalog() {
        assert_eq!(ACTIONS.len(), 12);
        for category in Category::ALL {
            assert_eq!(ACTIONS.iter().filter(|a| a.category == category).count(), 3);
        }
        assert!(find_action("teleport").is_none());
    }
}
