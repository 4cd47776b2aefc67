//! Persistent storage on sled.
//!
//! One tree per record kind, JSON values. Composite keys start with the
//! big-endian fid so per-user scans are prefix scans.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use notch_core::{ActivityLogEntry, Badge, Fid, TaskCompletion, UserScore};

use super::{KvStore, ScoreMutation, ScoreStore, StoreError, StoreResult};

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(e: TransactionError<StoreError>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(e) => StoreError::Backend(e.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredScore {
    seq: u64,
    score: UserScore,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    expires_at_ms: i64,
}

fn fid_key(fid: Fid) -> [u8; 8] {
    fid.to_be_bytes()
}

fn composite_key(fid: Fid, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + suffix.len());
    key.extend_from_slice(&fid.to_be_bytes());
    key.extend_from_slice(suffix);
    key
}

fn decode<T: for<'de> Deserialize<'de>>(raw: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(raw)?)
}

fn abort(e: impl Into<StoreError>) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(e.into())
}

/// [`ScoreStore`] and [`KvStore`] on a sled database.
pub struct SledStore {
    db: Db,
    scores: Tree,
    activity: Tree,
    badges: Tree,
    completions: Tree,
    referrals: Tree,
    referrals_by_referrer: Tree,
    kv: Tree,
}

impl SledStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened score database");
        Self::from_db(db)
    }

    /// Database that lives only as long as the process.
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        Ok(Self {
            scores: db.open_tree("scores")?,
            activity: db.open_tree("activity")?,
            badges: db.open_tree("badges")?,
            completions: db.open_tree("completions")?,
            referrals: db.open_tree("referrals")?,
            referrals_by_referrer: db.open_tree("referrals_by_referrer")?,
            kv: db.open_tree("kv")?,
            db,
        })
    }

    /// Flush pending writes to disk.
    pub async fn flush(&self) -> StoreResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for SledStore {
    fn id(&self) -> &str {
        "sled"
    }

    async fn get_score(&self, fid: Fid) -> StoreResult<Option<UserScore>> {
        match self.scores.get(fid_key(fid))? {
            Some(raw) => Ok(Some(decode::<StoredScore>(&raw)?.score)),
            None => Ok(None),
        }
    }

    async fn insert_score_if_absent(&self, score: UserScore) -> StoreResult<(UserScore, bool)> {
        let stored = StoredScore {
            seq: self.db.generate_id()?,
            score,
        };
        let bytes = serde_json::to_vec(&stored)?;

        match self
            .scores
            .compare_and_swap(fid_key(stored.score.fid()), None::<&[u8]>, Some(bytes))?
        {
            Ok(()) => Ok((stored.score, true)),
            Err(conflict) => {
                let current = conflict.current.ok_or_else(|| {
                    StoreError::Backend("compare_and_swap reported empty conflict".to_string())
                })?;
                Ok((decode::<StoredScore>(&current)?.score, false))
            }
        }
    }

    async fn commit_score(&self, mutation: ScoreMutation) -> StoreResult<()> {
        let fid = mutation.score.fid();
        let score_key = fid_key(fid);
        let activity_key = composite_key(fid, &self.db.generate_id()?.to_be_bytes());
        let entry_bytes = serde_json::to_vec(&mutation.entry)?;
        let fresh_seq = self.db.generate_id()?;
        let completion_key = mutation
            .settles_task
            .as_ref()
            .map(|task_id| composite_key(fid, task_id.as_bytes()));

        (&self.scores, &self.activity, &self.completions).transaction(
            |(scores, activity, completions)| {
                if let Some(key) = &completion_key {
                    let raw = completions.get(key)?.ok_or_else(|| {
                        abort(StoreError::Conflict(format!("no completion to settle for fid {fid}")))
                    })?;
                    let mut completion: TaskCompletion =
                        serde_json::from_slice(&raw).map_err(abort)?;
                    if completion.points_awarded {
                        return Err(abort(StoreError::Conflict(format!(
                            "completion {} for fid {fid} already paid",
                            completion.task_id
                        ))));
                    }
                    completion.points_awarded = true;
                    let bytes = serde_json::to_vec(&completion).map_err(abort)?;
                    completions.insert(key.as_slice(), bytes)?;
                }

                let seq = match scores.get(score_key)? {
                    Some(raw) => serde_json::from_slice::<StoredScore>(&raw).map_err(abort)?.seq,
                    None => fresh_seq,
                };
                let stored = StoredScore {
                    seq,
                    score: mutation.score.clone(),
                };
                scores.insert(&score_key[..], serde_json::to_vec(&stored).map_err(abort)?)?;
                activity.insert(activity_key.as_slice(), entry_bytes.as_slice())?;
                Ok(())
            },
        )?;
        Ok(())
    }

    async fn snapshot(&self) -> StoreResult<Vec<UserScore>> {
        let mut stored = Vec::new();
        for item in self.scores.iter() {
            let (_, raw) = item?;
            stored.push(decode::<StoredScore>(&raw)?);
        }
        stored.sort_by_key(|s| s.seq);
        Ok(stored.into_iter().map(|s| s.score).collect())
    }

    async fn append_activity(&self, entry: ActivityLogEntry) -> StoreResult<()> {
        let key = composite_key(entry.fid, &self.db.generate_id()?.to_be_bytes());
        self.activity.insert(key, serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    async fn activity_log(
        &self,
        fid: Fid,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ActivityLogEntry>> {
        self.activity
            .scan_prefix(fid_key(fid))
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|item| {
                let (_, raw) = item?;
                decode(&raw)
            })
            .collect()
    }

    async fn badges(&self, fid: Fid) -> StoreResult<Vec<Badge>> {
        let mut badges: Vec<Badge> = self
            .badges
            .scan_prefix(fid_key(fid))
            .map(|item| {
                let (_, raw) = item?;
                decode(&raw)
            })
            .collect::<StoreResult<_>>()?;
        badges.sort_by_key(|b| b.earned_at);
        Ok(badges)
    }

    async fn insert_badge_if_absent(&self, badge: Badge) -> StoreResult<bool> {
        let key = composite_key(badge.fid, badge.id.as_bytes());
        let bytes = serde_json::to_vec(&badge)?;
        Ok(self
            .badges
            .compare_and_swap(key, None::<&[u8]>, Some(bytes))?
            .is_ok())
    }

    async fn completion(&self, fid: Fid, task_id: &str) -> StoreResult<Option<TaskCompletion>> {
        match self.completions.get(composite_key(fid, task_id.as_bytes()))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    async fn completions(&self, fid: Fid) -> StoreResult<Vec<TaskCompletion>> {
        let mut completions: Vec<TaskCompletion> = self
            .completions
            .scan_prefix(fid_key(fid))
            .map(|item| {
                let (_, raw) = item?;
                decode(&raw)
            })
            .collect::<StoreResult<_>>()?;
        completions.sort_by_key(|c| c.completed_at);
        Ok(completions)
    }

    async fn insert_completion_if_absent(&self, completion: TaskCompletion) -> StoreResult<bool> {
        let key = composite_key(completion.fid, completion.task_id.as_bytes());
        let bytes = serde_json::to_vec(&completion)?;
        Ok(self
            .completions
            .compare_and_swap(key, None::<&[u8]>, Some(bytes))?
            .is_ok())
    }

    async fn record_referral_if_absent(&self, referrer: Fid, referee: Fid) -> StoreResult<bool> {
        let referee_key = fid_key(referee);
        let index_key = composite_key(referrer, &referee.to_be_bytes());

        let inserted = (&self.referrals, &self.referrals_by_referrer).transaction(
            |(referrals, by_referrer)| {
                if referrals.get(referee_key)?.is_some() {
                    return Ok(false);
                }
                referrals.insert(&referee_key[..], &fid_key(referrer)[..])?;
                by_referrer.insert(index_key.as_slice(), &[] as &[u8])?;
                Ok(true)
            },
        );
        inserted.map_err(|e: TransactionError<StoreError>| e.into())
    }

    async fn referral_count(&self, referrer: Fid) -> StoreResult<u64> {
        let mut count = 0u64;
        for item in self.referrals_by_referrer.scan_prefix(fid_key(referrer)) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl KvStore for SledStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let Some(raw) = self.kv.get(key.as_bytes())? else {
            return Ok(None);
        };
        let stored: StoredValue = decode(&raw)?;
        if stored.expires_at_ms <= Utc::now().timestamp_millis() {
            self.kv.remove(key.as_bytes())?;
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let stored = StoredValue {
            value,
            expires_at_ms: Utc::now().timestamp_millis().saturating_add(ttl_ms),
        };
        self.kv.insert(key.as_bytes(), serde_json::to_vec(&stored)?)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.kv.remove(key.as_bytes())?;
        Ok(())
    }
}
