//! Score records and activity log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::rank::{level_of, progress_of, rank_of};
use crate::types::{Category, CoreError, Fid, Rank};

/// Per-category point totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CategoryScores {
    #[serde(rename = "Builder")]
    pub builder: u64,
    #[serde(rename = "Social")]
    pub social: u64,
    #[serde(rename = "Degen")]
    pub degen: u64,
    #[serde(rename = "Player")]
    pub player: u64,
}

impl CategoryScores {
    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::Builder => self.builder,
            Category::Social => self.social,
            Category::Degen => self.degen,
            Category::Player => self.player,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut u64 {
        match category {
            Category::Builder => &mut self.builder,
            Category::Social => &mut self.social,
            Category::Degen => &mut self.degen,
            Category::Player => &mut self.player,
        }
    }

    /// Sum of all categories, `None` on overflow.
    pub fn checked_total(&self) -> Option<u64> {
        Category::ALL
            .into_iter()
            .try_fold(0u64, |acc, c| acc.checked_add(self.get(c)))
    }

    /// Iterate `(category, score)` in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, u64)> + '_ {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// Highest-scoring category; earlier categories win ties.
    pub fn primary(&self) -> Category {
        self.iter()
            .fold((Category::Builder, 0u64), |best, (c, s)| {
                if s > best.1 {
                    (c, s)
                } else {
                    best
                }
            })
            .0
    }
}

/// A user's current standing.
///
/// `rank` and `level` are derived from `total_score` and are only ever
/// recomputed, never set. Mutation goes through [`UserScore::apply_points`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserScore {
    fid: Fid,
    total_score: u64,
    category_scores: CategoryScores,
    rank: Rank,
    level: u64,
    season: u32,
    last_updated: DateTime<Utc>,
}

impl UserScore {
    /// Zeroed record: rank Mini, level 1.
    pub fn new(fid: Fid, season: u32, now: DateTime<Utc>) -> Self {
        Self {
            fid,
            total_score: 0,
            category_scores: CategoryScores::default(),
            rank: Rank::Mini,
            level: 1,
            season,
            last_updated: now,
        }
    }

    pub fn fid(&self) -> Fid {
        self.fid
    }

    pub fn total_score(&self) -> u64 {
        self.total_score
    }

    pub fn category_scores(&self) -> &CategoryScores {
        &self.category_scores
    }

    pub fn category_score(&self, category: Category) -> u64 {
        self.category_scores.get(category)
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn level(&self) -> u64 {
        self.level
    }

    pub fn season(&self) -> u32 {
        self.season
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Progress toward the next rank, `[0, 100]`.
    pub fn progress(&self) -> f64 {
        progress_of(self.total_score)
    }

    /// Add `points` to `category` and recompute derived fields.
    ///
    /// On overflow the record is left untouched.
    pub fn apply_points(
        &mut self,
        category: Category,
        points: u64,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let fid = self.fid;
        let overflow = || CoreError::ScoreOverflow { fid };
        let slot = self.category_scores.get(category).checked_add(points).ok_or_else(overflow)?;
        let total = self.total_score.checked_add(points).ok_or_else(overflow)?;

        *self.category_scores.get_mut(category) = slot;
        self.total_score = total;
        self.rank = rank_of(total);
        self.level = level_of(total);
        self.last_updated = now;
        Ok(())
    }

    /// Verify the derived fields agree with the category scores.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        let sum = self.category_scores.checked_total().ok_or_else(|| {
            CoreError::InvariantViolation(format!("category sum overflows for fid {}", self.fid))
        })?;
        if sum != self.total_score {
            return Err(CoreError::InvariantViolation(format!(
                "fid {}: total {} != category sum {}",
                self.fid, self.total_score, sum
            )));
        }
        if self.rank != rank_of(self.total_score) {
            return Err(CoreError::InvariantViolation(format!(
                "fid {}: rank {} does not match total {}",
                self.fid, self.rank, self.total_score
            )));
        }
        if self.level != level_of(self.total_score) {
            return Err(CoreError::InvariantViolation(format!(
                "fid {}: level {} does not match total {}",
                self.fid, self.level, self.total_score
            )));
        }
        Ok(())
    }
}

/// One point-earning event. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub fid: Fid,
    /// Free-form tag, e.g. `publish`, `swap`, `task_completion`
    pub activity_type: String,
    pub category: Category,
    pub points: u64,
    pub timestamp: DateTime<Utc>,
    /// Opaque audit payload
    #[cfg_attr(feature = "typescript", ts(type = "Record<string, unknown>"))]
    pub metadata: serde_json::Value,
}

impl ActivityLogEntry {
    pub fn new(
        fid: Fid,
        activity_type: impl Into<String>,
        category: Category,
        points: u64,
        metadata: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            fid,
            activity_type: activity_type.into(),
            category,
            points,
            timestamp,
            metadata,
        }
    }
}
