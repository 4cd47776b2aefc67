//! Engine-level error and result types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use notch_core::{
    ActivityLogEntry, Badge, Category, CategoryScores, CoreError, Fid, Rank, Season, UserScore,
};

use crate::store::StoreError;

/// Error types for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No score record exists for the user
    #[error("No score record for fid {0}")]
    NotFound(Fid),

    /// Task id is not in the registry
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Action id is not in the action catalog
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Referral rejected
    #[error("Invalid referral: {0}")]
    InvalidReferral(String),

    /// A score record broke a derived-field invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Domain rule rejected the operation
    #[error("Domain error: {0}")]
    Core(CoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvariantViolation(msg) => EngineError::InvariantViolation(msg),
            other => EngineError::Core(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// One row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based
    pub position: usize,
    pub fid: Fid,
    /// Total or category score, depending on the board
    pub score: u64,
    /// Overall rank, on every board
    pub rank: Rank,
    pub level: u64,
}

/// Result of a task completion attempt.
///
/// Only [`CompletionOutcome::Completed`] changes state; every other variant
/// is a soft rejection the caller may show to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionOutcome {
    Completed {
        #[serde(rename = "taskId")]
        task_id: String,
        category: Category,
        points: u64,
        score: UserScore,
    },
    AlreadyCompleted,
    VerificationFailed,
    NotActive,
    InProgress,
}

impl CompletionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompletionOutcome::Completed { .. })
    }

    /// Human-readable reason.
    pub fn message(&self) -> &'static str {
        match self {
            CompletionOutcome::Completed { .. } => "Task completed successfully",
            CompletionOutcome::AlreadyCompleted => "Task already completed",
            CompletionOutcome::VerificationFailed => "Activity verification failed",
            CompletionOutcome::NotActive => "Task is not active",
            CompletionOutcome::InProgress => "Task completion already in progress",
        }
    }
}

/// A points award detected outside the task flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsAward {
    pub category: Category,
    pub points: u64,
    pub activity_type: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl PointsAward {
    pub fn new(category: Category, points: u64, activity_type: impl Into<String>) -> Self {
        Self {
            category,
            points,
            activity_type: activity_type.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Standing within one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CategoryStanding {
    pub category: Category,
    pub score: u64,
    pub rank: Rank,
    pub level: u64,
    pub progress: f64,
}

/// Cumulative scores at the end of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct EvolutionPoint {
    pub date: NaiveDate,
    pub total: u64,
    pub categories: CategoryScores,
}

/// Everything a dashboard shows for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub score: UserScore,
    pub categories: Vec<CategoryStanding>,
    pub primary_category: Category,
    /// Progress toward the next rank, 0-100
    pub progress: f64,
    pub badges: Vec<Badge>,
    pub completed_tasks: usize,
    pub recent_activity: Vec<ActivityLogEntry>,
    pub global_position: Option<usize>,
    pub category_positions: BTreeMap<Category, usize>,
    pub total_users: usize,
    pub evolution: Vec<EvolutionPoint>,
    pub season: Season,
    pub streak_days: u32,
    pub generated_at: DateTime<Utc>,
}
