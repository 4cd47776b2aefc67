//! Notch Engine - scoring service
//!
//! Turns verified activity into category scores, ranks, badges and
//! leaderboard positions:
//!
//! - **Score ledger** ([`ScoreLedger`]): per-user serialized point awards that
//!   keep `total == Σ categories` and log every award
//! - **Activity log** ([`ActivityLog`]): append-only history, counts and the
//!   day-by-day evolution series
//! - **Badge evaluator** ([`BadgeEvaluator`]): grants each catalog badge at
//!   most once
//! - **Tasks** ([`TaskRegistry`], [`CompletionEngine`]): verify, record and pay
//!   a completion exactly once
//! - **Leaderboards** ([`Leaderboard`]): global and per-category standings
//! - **Verification** ([`Verifier`]): social, on-chain, attestation and
//!   referral strategies behind one fail-closed dispatch
//! - **Signals** ([`SignalScorer`], [`ScoreSweep`]): capped passive scoring
//!   from provider data, batched over users
//!
//! Storage sits behind [`store::ScoreStore`] and [`store::KvStore`], with
//! in-memory and sled backends.
//!
//! # Example
//!
//! ```no_run
//! use notch_engine::{EngineConfig, NotchEngine, PointsAward};
//! use notch_core::Category;
//!
//! # async fn run() -> notch_engine::Result<()> {
//! let engine = NotchEngine::with_config(EngineConfig::default())?;
//! engine
//!     .award_points(42, PointsAward::new(Category::Social, 10, "publish"))
//!     .await?;
//! let board = engine.leaderboard(None, 10).await?;
//! assert_eq!(board[0].fid, 42);
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod badges;
pub mod config;
pub mod leaderboard;
pub mod ledger;
pub mod referral;
pub mod service;
pub mod signals;
pub mod store;
pub mod streak;
pub mod tasks;
pub mod types;
pub mod verification;
pub mod worker;

// Re-export main types
pub use activity::ActivityLog;
pub use badges::BadgeEvaluator;
pub use config::EngineConfig;
pub use leaderboard::{Leaderboard, Positions};
pub use ledger::ScoreLedger;
pub use referral::ReferralTracker;
pub use service::{NotchEngine, NotchEngineBuilder};
pub use signals::{SignalOutcome, SignalScorer};
pub use streak::{Streak, StreakTracker};
pub use tasks::{CompletionEngine, TaskRegistry};
pub use types::*;
pub use verification::{VerificationStrategy, Verifier};
pub use worker::{ScoreSweep, SweepReport};
