//! Notch Core - scoring domain model
//!
//! Pure rules shared by every Notch component. Nothing in this crate
//! performs I/O:
//!
//! - **Categories & ranks**: Builder / Social / Degen / Player axes and the
//!   Mini → ProMax tier ladder
//! - **Rank calculator**: fixed-threshold rank, level and progress-to-next-rank
//! - **Score records**: [`UserScore`] with its `total == Σ categories` invariant,
//!   and append-only [`ActivityLogEntry`] records
//! - **Badge catalog**: declarative per-category achievement requirements
//! - **Task catalog**: time-bounded quests with tagged verification configs
//! - **Action catalog**: point-earning actions and their cooldowns
//! - **Season clock**: fixed-length scoring epochs
//!
//! # Example
//!
//! ```
//! use notch_core::{rank_of, level_of, Category, Rank, UserScore};
//!
//! assert_eq!(rank_of(99), Rank::Mini);
//! assert_eq!(rank_of(100), Rank::Core);
//! assert_eq!(level_of(250), 3);
//!
//! let mut score = UserScore::new(999, 1, chrono::Utc::now());
//! score.apply_points(Category::Social, 10, chrono::Utc::now()).unwrap();
//! assert_eq!(score.total_score(), 10);
//! ```

pub mod actions;
pub mod badges;
pub mod rank;
pub mod score;
pub mod season;
pub mod tasks;
pub mod types;

// Re-export main types
pub use actions::{find_action, ActionDefinition, Cooldown, ACTIONS};
pub use badges::{badges_for, Badge, BadgeDefinition, BadgeRequirement, BADGES};
pub use rank::{level_of, progress_of, rank_of};
pub use score::{ActivityLogEntry, CategoryScores, UserScore};
pub use season::{Season, SeasonClock};
pub use tasks::{
    default_catalog, AttestationRequirement, OnchainEventType, OnchainRequirement, ReferralRequirement,
    SocialRequirement, TaskCompletion, TaskDefinition, TaskSchedule, VerificationConfig,
    VerificationMethod,
};
pub use types::*;
