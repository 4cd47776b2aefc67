//! In-memory ledger storage.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use notch_core::{ActivityLogEntry, Badge, Fid, TaskCompletion, UserScore};

use super::{ScoreMutation, ScoreStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct ScoreSlot {
    seq: u64,
    score: UserScore,
}

/// `dashmap`-backed [`ScoreStore`].
///
/// Scores carry an insertion sequence so snapshots come back in
/// first-seen order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    scores: DashMap<Fid, ScoreSlot>,
    next_seq: AtomicU64,
    activity: DashMap<Fid, Vec<ActivityLogEntry>>,
    badges: DashMap<Fid, Vec<Badge>>,
    completions: DashMap<Fid, Vec<TaskCompletion>>,
    /// referee -> referrer
    referrals: DashMap<Fid, Fid>,
    /// Serializes multi-map commits
    commit: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn get_score(&self, fid: Fid) -> StoreResult<Option<UserScore>> {
        Ok(self.scores.get(&fid).map(|slot| slot.score.clone()))
    }

    async fn insert_score_if_absent(&self, score: UserScore) -> StoreResult<(UserScore, bool)> {
        match self.scores.entry(score.fid()) {
            Entry::Occupied(existing) => Ok((existing.get().score.clone(), false)),
            Entry::Vacant(slot) => {
                let seq = self.seq();
                slot.insert(ScoreSlot {
                    seq,
                    score: score.clone(),
                });
                Ok((score, true))
            }
        }
    }

    async fn commit_score(&self, mutation: ScoreMutation) -> StoreResult<()> {
        let _commit = self
            .commit
            .lock()
            .map_err(|_| StoreError::Backend("commit lock poisoned".to_string()))?;
        let fid = mutation.score.fid();

        if let Some(task_id) = &mutation.settles_task {
            let mut completions = self.completions.get_mut(&fid).ok_or_else(|| {
                StoreError::Conflict(format!("no completion {task_id} for fid {fid}"))
            })?;
            let completion = completions
                .iter_mut()
                .find(|c| &c.task_id == task_id)
                .ok_or_else(|| {
                    StoreError::Conflict(format!("no completion {task_id} for fid {fid}"))
                })?;
            if completion.points_awarded {
                return Err(StoreError::Conflict(format!(
                    "completion {task_id} for fid {fid} already paid"
                )));
            }
            completion.points_awarded = true;
        }

        match self.scores.entry(fid) {
            Entry::Occupied(mut existing) => existing.get_mut().score = mutation.score,
            Entry::Vacant(slot) => {
                let seq = self.seq();
                slot.insert(ScoreSlot {
                    seq,
                    score: mutation.score,
                });
            }
        }
        self.activity.entry(fid).or_default().push(mutation.entry);
        Ok(())
    }

    async fn snapshot(&self) -> StoreResult<Vec<UserScore>> {
        let mut slots: Vec<ScoreSlot> = self.scores.iter().map(|e| e.value().clone()).collect();
        slots.sort_by_key(|s| s.seq);
        Ok(slots.into_iter().map(|s| s.score).collect())
    }

    async fn append_activity(&self, entry: ActivityLogEntry) -> StoreResult<()> {
        self.activity.entry(entry.fid).or_default().push(entry);
        Ok(())
    }

    async fn activity_log(
        &self,
        fid: Fid,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ActivityLogEntry>> {
        let Some(entries) = self.activity.get(&fid) else {
            return Ok(Vec::new());
        };
        let limit = limit.unwrap_or(usize::MAX);
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    async fn badges(&self, fid: Fid) -> StoreResult<Vec<Badge>> {
        Ok(self.badges.get(&fid).map(|b| b.clone()).unwrap_or_default())
    }

    async fn insert_badge_if_absent(&self, badge: Badge) -> StoreResult<bool> {
        let mut held = self.badges.entry(badge.fid).or_default();
        if held.iter().any(|b| b.id == badge.id) {
            return Ok(false);
        }
        held.push(badge);
        Ok(true)
    }

    async fn completion(&self, fid: Fid, task_id: &str) -> StoreResult<Option<TaskCompletion>> {
        Ok(self
            .completions
            .get(&fid)
            .and_then(|c| c.iter().find(|c| c.task_id == task_id).cloned()))
    }

    async fn completions(&self, fid: Fid) -> StoreResult<Vec<TaskCompletion>> {
        Ok(self.completions.get(&fid).map(|c| c.clone()).unwrap_or_default())
    }

    async fn insert_completion_if_absent(&self, completion: TaskCompletion) -> StoreResult<bool> {
        let mut existing = self.completions.entry(completion.fid).or_default();
        if existing.iter().any(|c| c.task_id == completion.task_id) {
            return Ok(false);
        }
        existing.push(completion);
        Ok(true)
    }

    async fn record_referral_if_absent(&self, referrer: Fid, referee: Fid) -> StoreResult<bool> {
        match self.referrals.entry(referee) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(referrer);
                Ok(true)
            }
        }
    }

    async fn referral_count(&self, referrer: Fid) -> StoreResult<u64> {
        Ok(self
            .referrals
            .iter()
            .filter(|e| *e.value() == referrer)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use notch_core::{default_catalog, Category};

    fn entry(fid: Fid, activity_type: &str, points: u64) -> ActivityLogEntry {
        ActivityLogEntry::new(
            fid,
            activity_type,
            Category::Social,
            points,
            serde_json::Value::Null,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (_, created) = store.insert_score_if_absent(UserScore::new(1, 1, now)).await.unwrap();
        assert!(created);
        let (existing, created) = store.insert_score_if_absent(UserScore::new(1, 2, now)).await.unwrap();
        assert!(!created);
        assert_eq!(existing.season(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_insertion_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for fid in [30, 10, 20] {
            store.insert_score_if_absent(UserScore::new(fid, 1, now)).await.unwrap();
        }
        let fids: Vec<Fid> = store.snapshot().await.unwrap().iter().map(|s| s.fid()).collect();
        assert_eq!(fids, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_activity_most_recent_first() {
        let store = MemoryStore::new();
        store.append_activity(entry(1, "publish", 1)).await.unwrap();
        store.append_activity(entry(1, "reply", 2)).await.unwrap();
        store.append_activity(entry(1, "interact", 3)).await.unwrap();

        let log = store.activity_log(1, Some(2)).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].activity_type, "interact");
        assert_eq!(log[1].activity_type, "reply");
    }

    #[tokio::test]
    async fn test_commit_settles_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let task = default_catalog(now).remove(0);
        let completion = TaskCompletion::new(5, &task, serde_json::Value::Null, now);
        assert!(store.insert_completion_if_absent(completion.clone()).await.unwrap());
        assert!(!store.insert_completion_if_absent(completion).await.unwrap());

        let mut score = UserScore::new(5, 1, now);
        score.apply_points(task.category, task.points, now).unwrap();
        let mutation = ScoreMutation {
            score,
            entry: entry(5, "task_completion", task.points),
            settles_task: Some(task.id.clone()),
        };

        store.commit_score(mutation.clone()).await.unwrap();
        assert!(store.completion(5, &task.id).await.unwrap().unwrap().points_awarded);

        let err = store.commit_score(mutation).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.activity_log(5, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_referrals_count_each_referee_once() {
        let store = MemoryStore::new();
        assert!(store.record_referral_if_absent(1, 2).await.unwrap());
        assert!(store.record_referral_if_absent(1, 3).await.unwrap());
        assert!(!store.record_referral_if_absent(1, 2).await.unwrap());
        assert!(!store.record_referral_if_absent(9, 3).await.unwrap());
        assert_eq!(store.referral_count(1).await.unwrap(), 2);
        assert_eq!(store.referral_count(9).await.unwrap(), 0);
    }
}
