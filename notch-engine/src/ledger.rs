//! Score Ledger.
//!
//! All score mutations go through [`ScoreLedger`]. Writes for one user are
//! serialized by a per-fid async mutex; writes for different users proceed
//! in parallel. Each mutation is committed together with the activity entry
//! that explains it, and the record is self-checked before the commit.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use notch_core::{ActivityLogEntry, Category, Fid, SeasonClock, TaskCompletion, UserScore};

use crate::activity::ActivityLog;
use crate::store::{ScoreMutation, ScoreStore, StoreError};
use crate::types::{EngineError, PointsAward, Result};

/// Activity type written for task rewards.
pub const TASK_COMPLETION_ACTIVITY: &str = "task_completion";

type LockTable = DashMap<Fid, Arc<Mutex<()>>>;

/// One user's write lock. The table entry goes away with the last holder
/// or waiter.
struct FidGuard<'a> {
    locks: &'a LockTable,
    fid: Fid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FidGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own Arc is not counted.
        self.guard.take();
        self.locks
            .remove_if(&self.fid, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct ScoreLedger {
    store: Arc<dyn ScoreStore>,
    seasons: SeasonClock,
    locks: LockTable,
}

impl ScoreLedger {
    pub fn new(store: Arc<dyn ScoreStore>, seasons: SeasonClock) -> Self {
        Self {
            store,
            seasons,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ScoreStore> {
        &self.store
    }

    async fn lock(&self, fid: Fid) -> FidGuard<'_> {
        let lock = self.locks.entry(fid).or_default().clone();
        FidGuard {
            locks: &self.locks,
            fid,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Current record, or [`EngineError::NotFound`].
    pub async fn get_score(&self, fid: Fid) -> Result<UserScore> {
        self.find_score(fid).await?.ok_or(EngineError::NotFound(fid))
    }

    pub async fn find_score(&self, fid: Fid) -> Result<Option<UserScore>> {
        Ok(self.store.get_score(fid).await?)
    }

    /// Create a zeroed record. Returns the existing record if there is one.
    pub async fn initialize(&self, fid: Fid, now: DateTime<Utc>) -> Result<UserScore> {
        let fresh = UserScore::new(fid, self.seasons.season_id(now), now);
        let (score, created) = self.store.insert_score_if_absent(fresh).await?;
        if created {
            info!(fid = fid, season = score.season(), "Initialized score record");
        }
        Ok(score)
    }

    /// Add `points` to `category` and log the award.
    ///
    /// Creates the record first if the user has none.
    pub async fn add_points(
        &self,
        fid: Fid,
        category: Category,
        points: u64,
        activity_type: &str,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<UserScore> {
        let _guard = self.lock(fid).await;
        self.apply_locked(fid, category, points, activity_type, metadata, now)
            .await
    }

    /// Like [`add_points`](Self::add_points), but only when `allow` accepts
    /// the last time `award.activity_type` was logged for the user.
    ///
    /// The lookup and the award happen under the user's lock, so concurrent
    /// callers see each other's entries. Returns `None` when refused.
    pub async fn add_points_if<F>(
        &self,
        fid: Fid,
        award: &PointsAward,
        now: DateTime<Utc>,
        allow: F,
    ) -> Result<Option<UserScore>>
    where
        F: FnOnce(Option<DateTime<Utc>>) -> bool + Send,
    {
        let _guard = self.lock(fid).await;
        let last = ActivityLog::new(self.store.clone())
            .last_of_type(fid, &award.activity_type)
            .await?;
        if !allow(last) {
            debug!(fid = fid, activity_type = %award.activity_type, "Award refused");
            return Ok(None);
        }

        self.apply_locked(
            fid,
            award.category,
            award.points,
            &award.activity_type,
            award.metadata.clone(),
            now,
        )
        .await
        .map(Some)
    }

    /// Caller holds the user's lock.
    async fn apply_locked(
        &self,
        fid: Fid,
        category: Category,
        points: u64,
        activity_type: &str,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<UserScore> {
        let mut score = self.initialize(fid, now).await?;
        score.apply_points(category, points, now)?;
        score.check_invariants()?;

        let entry = ActivityLogEntry::new(fid, activity_type, category, points, metadata, now);
        self.store
            .commit_score(ScoreMutation {
                score: score.clone(),
                entry,
                settles_task: None,
            })
            .await?;

        info!(
            fid = fid,
            category = %category,
            points = points,
            activity_type = activity_type,
            total = score.total_score(),
            rank = %score.rank(),
            "Points awarded"
        );
        Ok(score)
    }

    /// Pay the reward for a stored completion.
    ///
    /// Returns `None` when the completion was already paid, so calling this
    /// any number of times pays at most once.
    pub async fn settle_completion(
        &self,
        completion: &TaskCompletion,
        now: DateTime<Utc>,
    ) -> Result<Option<UserScore>> {
        let fid = completion.fid;
        let _guard = self.lock(fid).await;

        match self.store.completion(fid, &completion.task_id).await? {
            Some(stored) if !stored.points_awarded => {}
            _ => {
                debug!(fid = fid, task_id = %completion.task_id, "Completion already settled");
                return Ok(None);
            }
        }

        let mut score = self.initialize(fid, now).await?;
        score.apply_points(completion.category, completion.points, now)?;
        score.check_invariants()?;

        let entry = ActivityLogEntry::new(
            fid,
            TASK_COMPLETION_ACTIVITY,
            completion.category,
            completion.points,
            serde_json::json!({
                "taskId": completion.task_id,
                "verificationData": completion.verification_data,
            }),
            now,
        );
        let mutation = ScoreMutation {
            score: score.clone(),
            entry,
            settles_task: Some(completion.task_id.clone()),
        };

        match self.store.commit_score(mutation).await {
            Ok(()) => {}
            Err(StoreError::Conflict(reason)) => {
                debug!(fid = fid, task_id = %completion.task_id, reason = %reason, "Settlement skipped");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            fid = fid,
            task_id = %completion.task_id,
            category = %completion.category,
            points = completion.points,
            total = score.total_score(),
            "Task reward paid"
        );
        Ok(Some(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use notch_core::{default_catalog, Rank};

    fn ledger() -> ScoreLedger {
        ScoreLedger::new(Arc::new(MemoryStore::new()), SeasonClock::default())
    }

    #[tokio::test]
    async fn test_fresh_user_not_found() {
        let ledger = ledger();
        assert!(matches!(
            ledger.get_score(999).await,
            Err(EngineError::NotFound(999))
        ));

        let now = Utc::now();
        ledger
            .add_points(999, Category::Social, 10, "publish", serde_json::Value::Null, now)
            .await
            .unwrap();
        let score = ledger.get_score(999).await.unwrap();
        assert_eq!(score.total_score(), 10);
        assert_eq!(score.category_score(Category::Social), 10);
        assert_eq!(score.rank(), Rank::Mini);
        assert_eq!(score.level(), 1);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let ledger = ledger();
        let now = Utc::now();
        ledger
            .add_points(1, Category::Degen, 40, "swap", serde_json::Value::Null, now)
            .await
            .unwrap();
        let again = ledger.initialize(1, now).await.unwrap();
        assert_eq!(again.total_score(), 40);
    }

    #[tokio::test]
    async fn test_rank_crossing() {
        let ledger = ledger();
        let now = Utc::now();
        ledger
            .add_points(7, Category::Social, 95, "publish", serde_json::Value::Null, now)
            .await
            .unwrap();
        assert_eq!(ledger.get_score(7).await.unwrap().rank(), Rank::Mini);

        let score = ledger
            .add_points(7, Category::Builder, 10, "deploy", serde_json::Value::Null, now)
            .await
            .unwrap();
        assert_eq!(score.total_score(), 105);
        assert_eq!(score.rank(), Rank::Core);
        assert_eq!(score.level(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_adds_lose_nothing() {
        let ledger = Arc::new(ledger());
        let now = Utc::now();
        let mut handles = Vec::new();
        for i in 0..50u64 {
            let ledger = ledger.clone();
            let category = Category::ALL[(i % 4) as usize];
            handles.push(tokio::spawn(async move {
                ledger
                    .add_points(3, category, 2, "test", serde_json::Value::Null, now)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let score = ledger.get_score(3).await.unwrap();
        assert_eq!(score.total_score(), 100);
        assert!(score.check_invariants().is_ok());
        assert_eq!(ledger.store().activity_log(3, None).await.unwrap().len(), 50);
        assert!(ledger.locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_table_drains() {
        let ledger = ledger();
        let now = Utc::now();
        for fid in 1..=20 {
            ledger
                .add_points(fid, Category::Player, 1, "play", serde_json::Value::Null, now)
                .await
                .unwrap();
        }
        assert!(ledger.locks.is_empty());

        let held = ledger.lock(5).await;
        assert_eq!(ledger.locks.len(), 1);
        drop(held);
        assert!(ledger.locks.is_empty());
    }

    #[tokio::test]
    async fn test_add_points_if_sees_last_entry() {
        let ledger = ledger();
        let now = Utc::now();
        let award = PointsAward::new(Category::Builder, 100, "deploy");

        let first = ledger
            .add_points_if(4, &award, now, |last| last.is_none())
            .await
            .unwrap();
        assert_eq!(first.unwrap().total_score(), 100);

        let mut seen = None;
        let second = ledger
            .add_points_if(4, &award, now, |last| {
                seen = last;
                last.is_none()
            })
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(seen, Some(now));
        assert_eq!(ledger.get_score(4).await.unwrap().total_score(), 100);
        assert_eq!(ledger.store().activity_log(4, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_points_if_serializes_the_check() {
        let ledger = Arc::new(ledger());
        let now = Utc::now();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                let award = PointsAward::new(Category::Builder, 100, "deploy");
                ledger
                    .add_points_if(6, &award, now, |last| last.is_none())
                    .await
                    .unwrap()
                    .is_some()
            }));
        }
        let mut paid = 0;
        for handle in handles {
            if handle.await.unwrap() {
                paid += 1;
            }
        }
        assert_eq!(paid, 1);
        assert_eq!(ledger.get_score(6).await.unwrap().total_score(), 100);
    }

    #[tokio::test]
    async fn test_settle_pays_once() {
        let ledger = ledger();
        let now = Utc::now();
        let task = default_catalog(now).remove(0);
        let completion = TaskCompletion::new(11, &task, serde_json::Value::Null, now);
        ledger
            .store()
            .insert_completion_if_absent(completion.clone())
            .await
            .unwrap();

        let paid = ledger.settle_completion(&completion, now).await.unwrap();
        assert_eq!(paid.unwrap().total_score(), task.points);
        assert!(ledger.settle_completion(&completion, now).await.unwrap().is_none());
        assert_eq!(ledger.get_score(11).await.unwrap().total_score(), task.points);
    }

    #[tokio::test]
    async fn test_settle_without_record_is_noop() {
        let ledger = ledger();
        let now = Utc::now();
        let task = default_catalog(now).remove(0);
        let completion = TaskCompletion::new(12, &task, serde_json::Value::Null, now);
        assert!(ledger.settle_completion(&completion, now).await.unwrap().is_none());
        assert!(ledger.find_score(12).await.unwrap().is_none());
    }
}
