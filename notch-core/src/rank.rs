//! Rank, level and progress calculation.
//!
//! Pure functions over a score value. Every derived field on a
//! [`UserScore`](crate::UserScore) is computed here and nowhere else.

use crate::types::Rank;

/// Points per level step.
pub const POINTS_PER_LEVEL: u64 = 100;

/// Highest rank whose threshold is at or below `score`.
pub fn rank_of(score: u64) -> Rank {
    Rank::ALL
        .into_iter()
        .rev()
        .find(|rank| score >= rank.threshold())
        .unwrap_or(Rank::Mini)
}

/// Level for a score: `floor(score / 100) + 1`.
pub fn level_of(score: u64) -> u64 {
    score / POINTS_PER_LEVEL + 1
}

/// Progress toward the next rank as a percentage in `[0, 100]`.
///
/// `0` at the current tier's threshold, `100` at the next tier's threshold.
/// Scores at the top tier report a flat `100`.
pub fn progress_of(score: u64) -> f64 {
    let current = rank_of(score);
    let Some(next) = current.next() else {
        return 100.0;
    };

    let floor = current.threshold();
    let span = next.threshold() - floor;
    let progress = (score - floor) as f64 / span as f64 * 100.0;

    progress.clamp(0.0, 100.0)
}
