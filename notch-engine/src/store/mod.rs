//! Storage seams for the engine.
//!
//! Two traits:
//! - [`ScoreStore`]: the durable ledger of scores, activity, badges,
//!   completions and referrals
//! - [`KvStore`]: expiring key-value storage for streaks, completed-task
//!   sets and signal bookkeeping

pub mod kv;
pub mod memory;
pub mod sled_store;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use notch_core::{ActivityLogEntry, Badge, Fid, TaskCompletion, UserScore};

pub use self::kv::MemoryKvStore;
pub use self::memory::MemoryStore;
pub use self::sled_store::SledStore;

/// Error types for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying storage failed
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Write rejected because the current state does not allow it
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A score write together with the activity entry that explains it.
///
/// When `settles_task` is set, the named completion must exist unpaid and is
/// marked paid in the same atomic write; otherwise the commit fails with
/// [`StoreError::Conflict`].
#[derive(Debug, Clone)]
pub struct ScoreMutation {
    pub score: UserScore,
    pub entry: ActivityLogEntry,
    pub settles_task: Option<String>,
}

/// Durable ledger storage.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Backend identifier.
    fn id(&self) -> &str;

    async fn get_score(&self, fid: Fid) -> StoreResult<Option<UserScore>>;

    /// Insert `score` unless a record exists. Returns the stored record and
    /// whether this call created it.
    async fn insert_score_if_absent(&self, score: UserScore) -> StoreResult<(UserScore, bool)>;

    /// Atomically write a score, append its log entry and settle a completion.
    async fn commit_score(&self, mutation: ScoreMutation) -> StoreResult<()>;

    /// Every score, in first-insertion order.
    async fn snapshot(&self) -> StoreResult<Vec<UserScore>>;

    /// Append a log entry that does not change the score.
    async fn append_activity(&self, entry: ActivityLogEntry) -> StoreResult<()>;

    /// Log entries for `fid`, most recent first.
    async fn activity_log(&self, fid: Fid, limit: Option<usize>)
        -> StoreResult<Vec<ActivityLogEntry>>;

    async fn badges(&self, fid: Fid) -> StoreResult<Vec<Badge>>;

    /// Returns `false` when the user already holds the badge.
    async fn insert_badge_if_absent(&self, badge: Badge) -> StoreResult<bool>;

    async fn completion(&self, fid: Fid, task_id: &str) -> StoreResult<Option<TaskCompletion>>;

    async fn completions(&self, fid: Fid) -> StoreResult<Vec<TaskCompletion>>;

    /// Returns `false` when a completion for `(fid, task_id)` already exists.
    async fn insert_completion_if_absent(&self, completion: TaskCompletion) -> StoreResult<bool>;

    /// Returns `false` when `referee` was already referred by anyone.
    async fn record_referral_if_absent(&self, referrer: Fid, referee: Fid) -> StoreResult<bool>;

    async fn referral_count(&self, referrer: Fid) -> StoreResult<u64>;
}

/// Expiring key-value storage.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

impl dyn KvStore {
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set_ex(key, raw, ttl).await
    }
}

/// Key-value key layout.
pub mod keys {
    use chrono::NaiveDate;
    use notch_core::{Category, Fid};

    pub fn completed_tasks(fid: Fid) -> String {
        format!("notch:tasks:{fid}:completed")
    }

    pub fn player_activity(fid: Fid) -> String {
        format!("notch:player:{fid}:activity")
    }

    pub fn signal_watermark(fid: Fid, category: Category) -> String {
        format!("notch:signals:{fid}:{}:since", category.as_str().to_lowercase())
    }

    pub fn daily_allowance(fid: Fid, category: Category, day: NaiveDate) -> String {
        format!(
            "notch:signals:{fid}:{}:{day}",
            category.as_str().to_lowercase()
        )
    }

    pub fn holdings(fid: Fid) -> String {
        format!("notch:signals:{fid}:holdings")
    }
}
