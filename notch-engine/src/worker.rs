//! Batch sweep over active users.
//!
//! Scores each user's signals with bounded concurrency and a per-user
//! deadline. One user's failure is logged and counted; it never stops the
//! batch.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use notch_core::Fid;

use crate::config::WorkerConfig;
use crate::signals::{SignalOutcome, SignalScorer};

/// Summary of one sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub processed: usize,
    /// Users who received any points
    pub updated: usize,
    pub points_awarded: u64,
    pub failed: Vec<(Fid, String)>,
    /// Provider failures that skipped a category without failing the user
    pub partial: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct ScoreSweep {
    scorer: Arc<SignalScorer>,
    concurrency: usize,
    per_user_timeout: Duration,
}

impl ScoreSweep {
    pub fn new(scorer: Arc<SignalScorer>, config: &WorkerConfig) -> Self {
        Self {
            scorer,
            concurrency: config.concurrency.max(1),
            per_user_timeout: config.per_user_timeout(),
        }
    }

    pub async fn run(&self, fids: &[Fid]) -> SweepReport {
        let started_at = Utc::now();
        info!(users = fids.len(), concurrency = self.concurrency, "Starting score sweep");

        let results: Vec<(Fid, Result<SignalOutcome, String>)> = stream::iter(fids.iter().copied())
            .map(|fid| async move { (fid, self.score_one(fid).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = SweepReport {
            processed: results.len(),
            updated: 0,
            points_awarded: 0,
            failed: Vec::new(),
            partial: 0,
            started_at,
            finished_at: started_at,
        };
        for (fid, result) in results {
            match result {
                Ok(outcome) => {
                    if outcome.points > 0 {
                        report.updated += 1;
                    }
                    if !outcome.skipped.is_empty() {
                        report.partial += 1;
                    }
                    report.points_awarded += outcome.points;
                }
                Err(e) => report.failed.push((fid, e)),
            }
        }
        report.failed.sort_by_key(|(fid, _)| *fid);
        report.finished_at = Utc::now();

        info!(
            processed = report.processed,
            updated = report.updated,
            failed = report.failed.len(),
            points = report.points_awarded,
            "Score sweep finished"
        );
        report
    }

    async fn score_one(&self, fid: Fid) -> Result<SignalOutcome, String> {
        match tokio::time::timeout(self.per_user_timeout, self.scorer.score_user(fid, Utc::now())).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                warn!(fid = fid, error = %e, "Scoring failed");
                Err(e.to_string())
            }
            Err(_) => {
                warn!(fid = fid, timeout_ms = self.per_user_timeout.as_millis() as u64, "Scoring timed out");
                Err(format!("timed out after {}ms", self.per_user_timeout.as_millis()))
            }
        }
    }
}
