//! Badge Evaluator.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use notch_core::{badges_for, Badge, Category, Fid};

use crate::activity::ActivityLog;
use crate::store::ScoreStore;
use crate::types::Result;

/// Awards badges whose requirements a user newly meets.
///
/// Evaluation reads the activity log and the completion records; running it
/// twice with no new activity awards nothing the second time.
#[derive(Clone)]
pub struct BadgeEvaluator {
    store: Arc<dyn ScoreStore>,
    activity: ActivityLog,
}

impl BadgeEvaluator {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self {
            activity: ActivityLog::new(store.clone()),
            store,
        }
    }

    /// Evaluate the badges of `category` and return those awarded by this call.
    pub async fn evaluate(
        &self,
        fid: Fid,
        category: Category,
        now: DateTime<Utc>,
    ) -> Result<Vec<Badge>> {
        let held: HashSet<String> = self
            .store
            .badges(fid)
            .await?
            .into_iter()
            .map(|b| b.id)
            .collect();

        let pending: Vec<_> = badges_for(category)
            .filter(|def| !held.contains(def.id))
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let counts = self.activity.count_by_type_and_category(fid, category).await?;
        let completed = self.store.completions(fid).await?.len() as u64;
        debug!(fid = fid, category = %category, completed = completed, "Evaluating badges");

        let mut awarded = Vec::new();
        for def in pending {
            if !def.requirement.is_met(&counts, completed) {
                continue;
            }
            let badge = def.award(fid, now);
            if self.store.insert_badge_if_absent(badge.clone()).await? {
                info!(fid = fid, badge_id = def.id, category = %category, "Badge awarded");
                awarded.push(badge);
            }
        }
        Ok(awarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ScoreLedger;
    use crate::store::MemoryStore;
    use notch_core::{default_catalog, SeasonClock, TaskCompletion};

    fn setup() -> (Arc<dyn ScoreStore>, ScoreLedger, BadgeEvaluator) {
        let store: Arc<dyn ScoreStore> = Arc::new(MemoryStore::new());
        let ledger = ScoreLedger::new(store.clone(), SeasonClock::default());
        let evaluator = BadgeEvaluator::new(store.clone());
        (store, ledger, evaluator)
    }

    #[tokio::test]
    async fn test_first_swap_awarded_once() {
        let (store, ledger, evaluator) = setup();
        let now = Utc::now();
        ledger
            .add_points(1, Category::Degen, 5, "swap", serde_json::Value::Null, now)
            .await
            .unwrap();

        let first = evaluator.evaluate(1, Category::Degen, now).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "first-swap");

        let second = evaluator.evaluate(1, Category::Degen, now).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(store.badges(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_type_counts_scoped_to_category() {
        let (_, ledger, evaluator) = setup();
        let now = Utc::now();
        // A "deploy" logged under Social does not count toward Builder badges.
        ledger
            .add_points(2, Category::Social, 1, "deploy", serde_json::Value::Null, now)
            .await
            .unwrap();
        assert!(evaluator.evaluate(2, Category::Builder, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quest_badge_from_completions() {
        let (store, _, evaluator) = setup();
        let now = Utc::now();
        let task = default_catalog(now).remove(0);
        store
            .insert_completion_if_absent(TaskCompletion::new(3, &task, serde_json::Value::Null, now))
            .await
            .unwrap();

        let awarded = evaluator.evaluate(3, Category::Player, now).await.unwrap();
        let ids: Vec<_> = awarded.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["first-quest"]);
    }

    #[tokio::test]
    async fn test_nothing_awarded_without_activity() {
        let (_, _, evaluator) = setup();
        for category in Category::ALL {
            assert!(evaluator.evaluate(9, category, Utc::now()).await.unwrap().is_empty());
        }
    }
}
