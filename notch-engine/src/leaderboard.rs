//! Leaderboard Aggregator.
//!
//! Read-only projections of a score snapshot. Sorting is stable, so equal
//! scores keep the snapshot's first-insertion order.

use std::collections::BTreeMap;
use std::sync::Arc;

use notch_core::{Category, Fid, UserScore};

use crate::store::ScoreStore;
use crate::types::{LeaderboardEntry, Result};

#[derive(Clone)]
pub struct Leaderboard {
    store: Arc<dyn ScoreStore>,
}

/// A user's 1-based positions across every board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Positions {
    pub global: Option<usize>,
    pub categories: BTreeMap<Category, usize>,
    pub total_users: usize,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self { store }
    }

    /// Ranked by total score.
    pub async fn global(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let snapshot = self.store.snapshot().await?;
        Ok(rank_by(snapshot, limit, |s| s.total_score()))
    }

    /// Ranked by one category's score. Rank and level stay the user's overall
    /// rank and level.
    pub async fn category(&self, category: Category, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let snapshot = self.store.snapshot().await?;
        Ok(rank_by(snapshot, limit, |s| s.category_score(category)))
    }

    pub async fn positions(&self, fid: Fid) -> Result<Positions> {
        let snapshot = self.store.snapshot().await?;
        let global = position_in(&snapshot, fid, |s| s.total_score());
        let mut categories = BTreeMap::new();
        for category in Category::ALL {
            if let Some(position) = position_in(&snapshot, fid, |s| s.category_score(category)) {
                categories.insert(category, position);
            }
        }
        Ok(Positions {
            global,
            categories,
            total_users: snapshot.len(),
        })
    }
}

fn position_in<F>(snapshot: &[UserScore], fid: Fid, key: F) -> Option<usize>
where
    F: Fn(&UserScore) -> u64,
{
    rank_by(snapshot.to_vec(), usize::MAX, key)
        .into_iter()
        .find(|e| e.fid == fid)
        .map(|e| e.position)
}

fn rank_by<F>(mut scores: Vec<UserScore>, limit: usize, key: F) -> Vec<LeaderboardEntry>
where
    F: Fn(&UserScore) -> u64,
{
    scores.sort_by(|a, b| key(b).cmp(&key(a)));
    scores
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, s)| LeaderboardEntry {
            position: i + 1,
            fid: s.fid(),
            score: key(s),
            rank: s.rank(),
            level: s.level(),
        })
        .collect()
}
