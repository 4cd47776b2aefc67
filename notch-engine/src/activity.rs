//! Activity Log queries and aggregates.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use notch_core::{ActivityLogEntry, Category, CategoryScores, Fid, UserScore};

use crate::store::ScoreStore;
use crate::types::{EvolutionPoint, Result};

/// Read/append view over the activity entries in a [`ScoreStore`].
///
/// Score-changing entries are written by the ledger in the same commit as
/// the score; [`ActivityLog::append`] is for zero-point audit entries.
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn ScoreStore>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self { store }
    }

    pub async fn append(&self, entry: ActivityLogEntry) -> Result<()> {
        self.store.append_activity(entry).await?;
        Ok(())
    }

    /// Most recent first.
    pub async fn query(&self, fid: Fid, limit: usize) -> Result<Vec<ActivityLogEntry>> {
        Ok(self.store.activity_log(fid, Some(limit)).await?)
    }

    /// Entry counts per activity type within `category`.
    pub async fn count_by_type_and_category(
        &self,
        fid: Fid,
        category: Category,
    ) -> Result<HashMap<String, u64>> {
        let mut counts = HashMap::new();
        for entry in self.store.activity_log(fid, None).await? {
            if entry.category == category {
                *counts.entry(entry.activity_type).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// When `activity_type` was last logged for the user.
    pub async fn last_of_type(
        &self,
        fid: Fid,
        activity_type: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .activity_log(fid, None)
            .await?
            .into_iter()
            .filter(|e| e.activity_type == activity_type)
            .map(|e| e.timestamp)
            .max())
    }

    /// Entries logged strictly after `since`, oldest first.
    pub async fn since(&self, fid: Fid, since: DateTime<Utc>) -> Result<Vec<ActivityLogEntry>> {
        let mut entries: Vec<_> = self
            .store
            .activity_log(fid, None)
            .await?
            .into_iter()
            .filter(|e| e.timestamp > since)
            .collect();
        entries.reverse();
        Ok(entries)
    }

    /// Cumulative scores at the end of each of the last `days` days,
    /// ending with today.
    ///
    /// Rebuilt from the log by subtracting entries newer than each day from
    /// the current score, so the last point equals `score`.
    pub async fn evolution(
        &self,
        score: &UserScore,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<EvolutionPoint>> {
        let entries = self.store.activity_log(score.fid(), None).await?;
        Ok(evolution_series(score, &entries, days, now.date_naive()))
    }
}

fn evolution_series(
    score: &UserScore,
    entries: &[ActivityLogEntry],
    days: u32,
    today: NaiveDate,
) -> Vec<EvolutionPoint> {
    let mut later: HashMap<NaiveDate, CategoryScores> = HashMap::new();
    for entry in entries {
        let day = entry.timestamp.date_naive();
        if day > today - Duration::days(i64::from(days)) {
            let slot = later.entry(day).or_default().get_mut(entry.category);
            *slot = slot.saturating_add(entry.points);
        }
    }

    let mut running = *score.category_scores();
    let mut series = Vec::with_capacity(days as usize);
    for offset in 0..i64::from(days) {
        let day = today - Duration::days(offset);
        series.push(EvolutionPoint {
            date: day,
            total: running.checked_total().unwrap_or(u64::MAX),
            categories: running,
        });
        if let Some(delta) = later.get(&day) {
            for category in Category::ALL {
                let slot = running.get_mut(category);
                *slot = slot.saturating_sub(delta.get(category));
            }
        }
    }
    series.reverse();
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ScoreLedger;
    use crate::store::MemoryStore;
    use notch_core::SeasonClock;

    fn setup() -> (ScoreLedger, ActivityLog) {
        let store: Arc<dyn ScoreStore> = Arc::new(MemoryStore::new());
        (
            ScoreLedger::new(store.clone(), SeasonClock::default()),
            ActivityLog::new(store),
        )
    }

    #[tokio::test]
    async fn test_counts_by_type_within_category() {
        let (ledger, log) = setup();
        let now = Utc::now();
        for (category, kind) in [
            (Category::Social, "publish"),
            (Category::Social, "publish"),
            (Category::Social, "reply"),
            (Category::Degen, "swap"),
        ] {
            ledger
                .add_points(1, category, 1, kind, serde_json::Value::Null, now)
                .await
                .unwrap();
        }

        let counts = log.count_by_type_and_category(1, Category::Social).await.unwrap();
        assert_eq!(counts.get("publish"), Some(&2));
        assert_eq!(counts.get("reply"), Some(&1));
        assert_eq!(counts.get("swap"), None);
    }

    #[tokio::test]
    async fn test_log_sums_match_scores() {
        let (ledger, log) = setup();
        let now = Utc::now();
        ledger
            .add_points(2, Category::Builder, 50, "deploy", serde_json::Value::Null, now)
            .await
            .unwrap();
        let score = ledger
            .add_points(2, Category::Player, 7, "streak", serde_json::Value::Null, now)
            .await
            .unwrap();

        let entries = log.query(2, 100).await.unwrap();
        for category in Category::ALL {
            let logged: u64 = entries
                .iter()
                .filter(|e| e.category == category)
                .map(|e| e.points)
                .sum();
            assert_eq!(logged, score.category_score(category));
        }
    }

    #[test]
    fn test_evolution_series() {
        let now = Utc::now();
        let today = now.date_naive();
        let yesterday = now - Duration::days(1);

        let mut score = UserScore::new(5, 1, now);
        score.apply_points(Category::Social, 10, now).unwrap();
        score.apply_points(Category::Degen, 5, now).unwrap();

        let entries = vec![
            ActivityLogEntry::new(5, "publish", Category::Social, 4, serde_json::Value::Null, yesterday),
            ActivityLogEntry::new(5, "publish", Category::Social, 6, serde_json::Value::Null, now),
            ActivityLogEntry::new(5, "swap", Category::Degen, 5, serde_json::Value::Null, now),
        ];
        let series = evolution_series(&score, &entries, 3, today);

        assert_eq!(series.len(), 3);
        assert_eq!(series[2].date, today);
        assert_eq!(series[2].total, 15);
        assert_eq!(series[1].total, 4);
        assert_eq!(series[1].categories.social, 4);
        assert_eq!(series[0].total, 0);
    }
}
