//! Task completion state machine.
//!
//! Per `(fid, task_id)`: not started, then verifying, then completed or
//! rejected. Completion is terminal; a rejection leaves nothing behind so
//! the user may retry.
//!
//! The completion record is written before the reward is paid. Payment is
//! keyed by that record and marks it paid atomically, so a crash between
//! the two steps leaves an unpaid record that [`CompletionEngine::reconcile`]
//! pays later, never a second payment.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use notch_core::{Fid, TaskCompletion, TaskDefinition};

use crate::ledger::ScoreLedger;
use crate::store::{keys, KvStore, ScoreStore};
use crate::types::{CompletionOutcome, EngineError, Result};
use crate::verification::Verifier;

use super::TaskRegistry;

type InFlightKey = (Fid, String);

/// Marks a `(fid, task_id)` as verifying until dropped.
struct InFlight<'a> {
    claims: &'a DashMap<InFlightKey, ()>,
    key: InFlightKey,
}

impl<'a> InFlight<'a> {
    fn acquire(claims: &'a DashMap<InFlightKey, ()>, key: InFlightKey) -> Option<Self> {
        match claims.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self { claims, key })
            }
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.claims.remove(&self.key);
    }
}

pub struct CompletionEngine {
    registry: Arc<TaskRegistry>,
    store: Arc<dyn ScoreStore>,
    kv: Arc<dyn KvStore>,
    ledger: Arc<ScoreLedger>,
    verifier: Arc<Verifier>,
    retention: Duration,
    in_flight: DashMap<InFlightKey, ()>,
}

impl CompletionEngine {
    pub fn new(
        registry: Arc<TaskRegistry>,
        store: Arc<dyn ScoreStore>,
        kv: Arc<dyn KvStore>,
        ledger: Arc<ScoreLedger>,
        verifier: Arc<Verifier>,
        retention: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            kv,
            ledger,
            verifier,
            retention,
            in_flight: DashMap::new(),
        }
    }

    /// Claim `task_id` for `fid`.
    ///
    /// Unknown tasks are an error; every other rejection is reported in the
    /// returned [`CompletionOutcome`].
    pub async fn complete(
        &self,
        fid: Fid,
        task_id: &str,
        verification_data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        let task = self
            .registry
            .get(task_id, now)
            .await
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;

        if !task.is_eligible(now) {
            debug!(fid = fid, task_id = task_id, "Task not active");
            return Ok(CompletionOutcome::NotActive);
        }

        if self.is_completed(fid, &task, now).await? {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        let Some(_claim) = InFlight::acquire(&self.in_flight, (fid, task.id.clone())) else {
            debug!(fid = fid, task_id = task_id, "Completion already in progress");
            return Ok(CompletionOutcome::InProgress);
        };

        if !self.verifier.verify(fid, &task, now).await {
            info!(fid = fid, task_id = task_id, "Task verification rejected");
            return Ok(CompletionOutcome::VerificationFailed);
        }

        let completion = TaskCompletion::new(fid, &task, verification_data, now);
        if !self.store.insert_completion_if_absent(completion.clone()).await? {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }
        info!(fid = fid, task_id = task_id, "Task completion recorded");

        let score = match self.ledger.settle_completion(&completion, now).await? {
            Some(score) => score,
            None => self.ledger.get_score(fid).await?,
        };
        self.remember_completed(fid, &task.id).await;

        Ok(CompletionOutcome::Completed {
            task_id: task.id,
            category: task.category,
            points: task.points,
            score,
        })
    }

    /// Whether a completion exists. An existing record whose reward was
    /// never paid is settled on the way.
    async fn is_completed(
        &self,
        fid: Fid,
        task: &TaskDefinition,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let cached = match self.completed_ids(fid).await {
            Ok(ids) => ids.iter().any(|id| id == &task.id),
            Err(e) => {
                warn!(fid = fid, error = %e, "Completed-task cache unavailable");
                false
            }
        };

        let Some(stored) = self.store.completion(fid, &task.id).await? else {
            return Ok(cached);
        };
        if !stored.points_awarded {
            if let Some(score) = self.ledger.settle_completion(&stored, now).await? {
                info!(
                    fid = fid,
                    task_id = %task.id,
                    total = score.total_score(),
                    "Settled previously unpaid completion"
                );
            }
        }
        Ok(true)
    }

    async fn completed_ids(&self, fid: Fid) -> Result<Vec<String>> {
        Ok(self
            .kv
            .get_json::<Vec<String>>(&keys::completed_tasks(fid))
            .await?
            .unwrap_or_default())
    }

    async fn remember_completed(&self, fid: Fid, task_id: &str) {
        let key = keys::completed_tasks(fid);
        let mut ids = match self.completed_ids(fid).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(fid = fid, error = %e, "Completed-task cache unavailable");
                return;
            }
        };
        if !ids.iter().any(|id| id == task_id) {
            ids.push(task_id.to_string());
        }
        if let Err(e) = self.kv.set_json(&key, &ids, self.retention).await {
            warn!(fid = fid, task_id = task_id, error = %e, "Failed to cache completed task");
        }
    }

    /// Task ids the user has completed.
    pub async fn completed_task_ids(&self, fid: Fid) -> Result<Vec<String>> {
        Ok(self
            .store
            .completions(fid)
            .await?
            .into_iter()
            .map(|c| c.task_id)
            .collect())
    }

    /// Active tasks the user has not completed.
    pub async fn available(&self, fid: Fid, now: DateTime<Utc>) -> Result<Vec<TaskDefinition>> {
        let completed = self.completed_task_ids(fid).await?;
        Ok(self
            .registry
            .active(now)
            .await
            .into_iter()
            .filter(|t| !completed.contains(&t.id))
            .collect())
    }

    /// Pay every completion of `fid` whose reward was never applied.
    /// Returns the completions paid by this call.
    pub async fn reconcile(&self, fid: Fid, now: DateTime<Utc>) -> Result<Vec<TaskCompletion>> {
        let mut paid = Vec::new();
        for completion in self.store.completions(fid).await? {
            if completion.points_awarded {
                continue;
            }
            if self.ledger.settle_completion(&completion, now).await?.is_some() {
                paid.push(completion);
            }
        }
        if !paid.is_empty() {
            info!(fid = fid, paid = paid.len(), "Reconciled unpaid completions");
        }
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerificationSettings;
    use crate::store::{MemoryKvStore, MemoryStore};
    use chrono::Duration as ChronoDuration;
    use notch_core::{Category, SeasonClock};
    use notch_providers::{MockAttestationProvider, MockChainProvider, MockSocialProvider};

    struct Fixture {
        engine: CompletionEngine,
        store: Arc<dyn ScoreStore>,
        ledger: Arc<ScoreLedger>,
        registry: Arc<TaskRegistry>,
    }

    fn fixture(social: MockSocialProvider, now: DateTime<Utc>) -> Fixture {
        let store: Arc<dyn ScoreStore> = Arc::new(MemoryStore::new());
        let ledger = Arc::new(ScoreLedger::new(store.clone(), SeasonClock::default()));
        let registry = Arc::new(TaskRegistry::with_defaults(now, &[]));
        let verifier = Arc::new(Verifier::new(
            Arc::new(social),
            Arc::new(MockChainProvider::new("base")),
            Arc::new(MockAttestationProvider::new()),
            store.clone(),
            &VerificationSettings::default(),
        ));
        let engine = CompletionEngine::new(
            registry.clone(),
            store.clone(),
            Arc::new(MemoryKvStore::new()),
            ledger.clone(),
            verifier,
            Duration::from_secs(3600),
        );
        Fixture {
            engine,
            store,
            ledger,
            registry,
        }
    }

    fn posted(fid: Fid, now: DateTime<Utc>) -> MockSocialProvider {
        MockSocialProvider::new().with_post(fid, "shipping with #notch today", now)
    }

    #[tokio::test]
    async fn test_double_claim_pays_once() {
        let now = Utc::now();
        let f = fixture(posted(1, now), now);

        let first = f
            .engine
            .complete(1, "daily-cast-notch", serde_json::Value::Null, now)
            .await
            .unwrap();
        assert!(first.is_success());
        assert_eq!(f.ledger.get_score(1).await.unwrap().total_score(), 25);

        let second = f
            .engine
            .complete(1, "daily-cast-notch", serde_json::Value::Null, now)
            .await
            .unwrap();
        assert_eq!(second, CompletionOutcome::AlreadyCompleted);
        assert_eq!(f.ledger.get_score(1).await.unwrap().total_score(), 25);
    }

    #[tokio::test]
    async fn test_daily_task_claimable_days_after_startup() {
        let built = Utc::now();
        let later = built + ChronoDuration::days(2);
        let f = fixture(posted(1, later), built);

        let outcome = f
            .engine
            .complete(1, "daily-cast-notch", serde_json::Value::Null, later)
            .await
            .unwrap();
        assert!(outcome.is_success(), "got {outcome:?}");
        let completion = f.store.completion(1, "daily-cast-notch").await.unwrap().unwrap();
        assert_eq!(completion.completed_at, later);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let now = Utc::now();
        let f = fixture(MockSocialProvider::new(), now);
        let err = f
            .engine
            .complete(1, "no-such-task", serde_json::Value::Null, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_verification_leaves_no_trace() {
        let now = Utc::now();
        let f = fixture(MockSocialProvider::new(), now);
        let outcome = f
            .engine
            .complete(1, "daily-cast-notch", serde_json::Value::Null, now)
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::VerificationFailed);
        assert!(f.store.completions(1).await.unwrap().is_empty());
        assert!(f.ledger.find_score(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_task_rejected() {
        let now = Utc::now();
        let f = fixture(posted(1, now), now);
        let mut task = f.registry.get("daily-cast-notch", now).await.unwrap();
        task.active = false;
        f.registry.register(task).await;

        let outcome = f
            .engine
            .complete(1, "daily-cast-notch", serde_json::Value::Null, now)
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::NotActive);
    }

    #[tokio::test]
    async fn test_concurrent_claims_pay_once() {
        let now = Utc::now();
        let f = Arc::new(fixture(posted(1, now), now));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                f.engine
                    .complete(1, "daily-cast-notch", serde_json::Value::Null, now)
                    .await
                    .unwrap()
            }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_success() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(f.ledger.get_score(1).await.unwrap().total_score(), 25);
    }

    #[tokio::test]
    async fn test_reconcile_pays_unpaid_once() {
        let now = Utc::now();
        let f = fixture(MockSocialProvider::new(), now);
        let task = f.registry.get("weekly-deploy", now).await.unwrap();
        f.store
            .insert_completion_if_absent(TaskCompletion::new(4, &task, serde_json::Value::Null, now))
            .await
            .unwrap();

        let paid = f.engine.reconcile(4, now).await.unwrap();
        assert_eq!(paid.len(), 1);
        let score = f.ledger.get_score(4).await.unwrap();
        assert_eq!(score.category_score(Category::Builder), 100);

        assert!(f.engine.reconcile(4, now).await.unwrap().is_empty());
        assert_eq!(f.ledger.get_score(4).await.unwrap().total_score(), 100);
    }

    #[tokio::test]
    async fn test_claim_settles_stranded_completion() {
        let now = Utc::now();
        let f = fixture(MockSocialProvider::new(), now);
        let task = f.registry.get("weekly-deploy", now).await.unwrap();
        f.store
            .insert_completion_if_absent(TaskCompletion::new(5, &task, serde_json::Value::Null, now))
            .await
            .unwrap();

        let claim_at = now + ChronoDuration::minutes(30);
        let outcome = f
            .engine
            .complete(5, "weekly-deploy", serde_json::Value::Null, claim_at)
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::AlreadyCompleted);
        let score = f.ledger.get_score(5).await.unwrap();
        assert_eq!(score.total_score(), 100);
        assert_eq!(score.last_updated(), claim_at);
        let log = f.store.activity_log(5, None).await.unwrap();
        assert_eq!(log[0].timestamp, claim_at);
    }

    #[tokio::test]
    async fn test_available_excludes_completed() {
        let now = Utc::now();
        let f = fixture(posted(1, now), now);
        assert_eq!(f.engine.available(1, now).await.unwrap().len(), 5);

        f.engine
            .complete(1, "daily-cast-notch", serde_json::Value::Null, now)
            .await
            .unwrap();
        let available = f.engine.available(1, now).await.unwrap();
        assert_eq!(available.len(), 4);
        assert!(available.iter().all(|t| t.id != "daily-cast-notch"));

        let later = now + ChronoDuration::days(40);
        let available = f.engine.available(1, later).await.unwrap();
        assert_eq!(available.len(), 4);
        assert!(available.iter().all(|t| t.id != "daily-cast-notch"));
    }
}
