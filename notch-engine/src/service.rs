//! NotchEngine - the scoring service.
//!
//! One object per process, built with its store, key-value store and
//! providers injected. Every core-exposed operation goes through it.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use notch_core::{
    find_action, Badge, Category, Fid, Season, SeasonClock, TaskCompletion, TaskDefinition,
    UserScore,
};
use notch_providers::{
    AlchemyClient, AttestationProvider, ChainProvider, DisabledProvider, EasClient, NeynarClient,
    SocialProvider,
};

use crate::activity::ActivityLog;
use crate::badges::BadgeEvaluator;
use crate::config::{EngineConfig, StoreBackend};
use crate::leaderboard::Leaderboard;
use crate::ledger::ScoreLedger;
use crate::referral::ReferralTracker;
use crate::signals::{SignalOutcome, SignalScorer};
use crate::store::{KvStore, MemoryKvStore, MemoryStore, ScoreStore, SledStore};
use crate::streak::{Streak, StreakTracker};
use crate::tasks::{CompletionEngine, TaskRegistry};
use crate::types::{
    CategoryStanding, CompletionOutcome, EngineError, LeaderboardEntry, PointsAward, Result,
    UserProfile,
};
use crate::verification::Verifier;
use crate::worker::{ScoreSweep, SweepReport};

const RECENT_ACTIVITY: usize = 10;
const EVOLUTION_DAYS: u32 = 30;

/// Builds a [`NotchEngine`]. Anything not injected comes from the config.
pub struct NotchEngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn ScoreStore>>,
    kv: Option<Arc<dyn KvStore>>,
    social: Option<Arc<dyn SocialProvider>>,
    chain: Option<Arc<dyn ChainProvider>>,
    attestations: Option<Arc<dyn AttestationProvider>>,
    registry: Option<TaskRegistry>,
}

impl NotchEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            store: None,
            kv: None,
            social: None,
            chain: None,
            attestations: None,
            registry: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ScoreStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_kv(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn with_social(mut self, social: Arc<dyn SocialProvider>) -> Self {
        self.social = Some(social);
        self
    }

    pub fn with_chain(mut self, chain: Arc<dyn ChainProvider>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_attestations(mut self, attestations: Arc<dyn AttestationProvider>) -> Self {
        self.attestations = Some(attestations);
        self
    }

    /// Use `registry` instead of the built-in catalog.
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<NotchEngine> {
        let config = self.config;

        let (store, kv) = match (self.store, self.kv) {
            (Some(store), Some(kv)) => (store, kv),
            (store, kv) => {
                let (default_store, default_kv) = open_stores(&config)?;
                (store.unwrap_or(default_store), kv.unwrap_or(default_kv))
            }
        };

        let providers = &config.providers;
        let neynar = Arc::new(
            NeynarClient::new(&providers.social_url, providers.social_api_key.clone())
                .map_err(|e| EngineError::Config(format!("social provider: {e}")))?,
        );
        let social: Arc<dyn SocialProvider> = match self.social {
            Some(social) => social,
            None if providers.social_api_key.is_some() => neynar.clone(),
            None => Arc::new(DisabledProvider::new("social")),
        };
        let chain: Arc<dyn ChainProvider> = match self.chain {
            Some(chain) => chain,
            None if providers.chain_api_key.is_some() => Arc::new(
                AlchemyClient::new(
                    &providers.chain_url,
                    &providers.chain_network,
                    providers.chain_api_key.clone(),
                    neynar,
                )
                .map_err(|e| EngineError::Config(format!("chain provider: {e}")))?,
            ),
            None => Arc::new(DisabledProvider::new("chain")),
        };
        let attestations: Arc<dyn AttestationProvider> = match self.attestations {
            Some(attestations) => attestations,
            None => Arc::new(
                EasClient::new(&providers.attestation_url)
                    .map_err(|e| EngineError::Config(format!("attestation provider: {e}")))?,
            ),
        };

        let now = Utc::now();
        let seasons = config.season.clock();
        let retention = config.retention.ttl();
        let partner_schemas = config.tasks.partner_schema_ids.clone();

        let ledger = Arc::new(ScoreLedger::new(store.clone(), seasons));
        let registry = Arc::new(
            self.registry
                .unwrap_or_else(|| TaskRegistry::with_defaults(now, &partner_schemas)),
        );
        let verifier = Arc::new(Verifier::new(
            social.clone(),
            chain.clone(),
            attestations.clone(),
            store.clone(),
            &config.verification,
        ));
        let completions = CompletionEngine::new(
            registry.clone(),
            store.clone(),
            kv.clone(),
            ledger.clone(),
            verifier,
            retention,
        );
        let streaks = StreakTracker::new(kv.clone(), retention);
        let scorer = Arc::new(SignalScorer::new(
            ledger.clone(),
            kv,
            streaks.clone(),
            social,
            chain,
            attestations,
            config.signals.clone(),
            partner_schemas,
            retention,
        ));
        let sweep = ScoreSweep::new(scorer.clone(), &config.worker);

        info!(store = store.id(), season = seasons.season_id(now), "Notch engine ready");

        Ok(NotchEngine {
            activity: ActivityLog::new(store.clone()),
            badges: BadgeEvaluator::new(store.clone()),
            leaderboard: Leaderboard::new(store.clone()),
            referrals: ReferralTracker::new(store.clone()),
            store,
            seasons,
            ledger,
            registry,
            completions,
            streaks,
            scorer,
            sweep,
            config,
        })
    }
}

fn open_stores(config: &EngineConfig) -> Result<(Arc<dyn ScoreStore>, Arc<dyn KvStore>)> {
    match config.store.backend {
        StoreBackend::Memory => {
            let store: Arc<dyn ScoreStore> = Arc::new(MemoryStore::new());
            let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
            Ok((store, kv))
        }
        StoreBackend::Sled => {
            let sled = Arc::new(SledStore::open(&config.store.path)?);
            let store: Arc<dyn ScoreStore> = sled.clone();
            let kv: Arc<dyn KvStore> = sled;
            Ok((store, kv))
        }
    }
}

/// The scoring service.
pub struct NotchEngine {
    config: EngineConfig,
    store: Arc<dyn ScoreStore>,
    seasons: SeasonClock,
    ledger: Arc<ScoreLedger>,
    activity: ActivityLog,
    badges: BadgeEvaluator,
    leaderboard: Leaderboard,
    registry: Arc<TaskRegistry>,
    completions: CompletionEngine,
    referrals: ReferralTracker,
    streaks: StreakTracker,
    scorer: Arc<SignalScorer>,
    sweep: ScoreSweep,
}

impl NotchEngine {
    pub fn builder(config: EngineConfig) -> NotchEngineBuilder {
        NotchEngineBuilder::new(config)
    }

    /// Engine on in-memory storage with providers from `config`.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        NotchEngineBuilder::new(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn get_score(&self, fid: Fid) -> Result<UserScore> {
        self.ledger.get_score(fid).await
    }

    pub async fn badges(&self, fid: Fid) -> Result<Vec<Badge>> {
        Ok(self.store.badges(fid).await?)
    }

    /// Full dashboard view. [`EngineError::NotFound`] if the user has no score.
    pub async fn profile(&self, fid: Fid) -> Result<UserProfile> {
        let now = Utc::now();
        let score = self.ledger.get_score(fid).await?;

        let categories = score
            .category_scores()
            .iter()
            .map(|(category, points)| CategoryStanding {
                category,
                score: points,
                rank: notch_core::rank_of(points),
                level: notch_core::level_of(points),
                progress: notch_core::progress_of(points),
            })
            .collect();
        let positions = self.leaderboard.positions(fid).await?;

        Ok(UserProfile {
            categories,
            primary_category: score.category_scores().primary(),
            progress: score.progress(),
            badges: self.store.badges(fid).await?,
            completed_tasks: self.store.completions(fid).await?.len(),
            recent_activity: self.activity.query(fid, RECENT_ACTIVITY).await?,
            global_position: positions.global,
            category_positions: positions.categories,
            total_users: positions.total_users,
            evolution: self.activity.evolution(&score, EVOLUTION_DAYS, now).await?,
            season: self.seasons.current(now),
            streak_days: self.streaks.current_days(fid, now.date_naive()).await?,
            generated_at: now,
            score,
        })
    }

    /// Global board, or one category's board.
    pub async fn leaderboard(
        &self,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        match category {
            Some(category) => self.leaderboard.category(category, limit).await,
            None => self.leaderboard.global(limit).await,
        }
    }

    pub async fn active_tasks(&self) -> Vec<TaskDefinition> {
        self.registry.active(Utc::now()).await
    }

    /// Active tasks `fid` has not completed yet.
    pub async fn available_tasks(&self, fid: Fid) -> Result<Vec<TaskDefinition>> {
        self.completions.available(fid, Utc::now()).await
    }

    pub fn current_season(&self) -> Season {
        self.seasons.current(Utc::now())
    }

    /// Every user with a score record, in first-seen order.
    pub async fn known_fids(&self) -> Result<Vec<Fid>> {
        Ok(self.store.snapshot().await?.iter().map(|s| s.fid()).collect())
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Verify and record a task completion, paying its reward once.
    pub async fn complete_task(
        &self,
        fid: Fid,
        task_id: &str,
        verification_data: serde_json::Value,
    ) -> Result<CompletionOutcome> {
        let now = Utc::now();
        let outcome = self
            .completions
            .complete(fid, task_id, verification_data, now)
            .await?;

        if let CompletionOutcome::Completed { category, .. } = &outcome {
            self.touch_quietly(fid).await;
            self.evaluate_badges(fid, &[*category, Category::Player]).await;
        }
        Ok(outcome)
    }

    /// Award points detected outside the task flow.
    pub async fn award_points(&self, fid: Fid, award: PointsAward) -> Result<UserScore> {
        let score = self
            .ledger
            .add_points(
                fid,
                award.category,
                award.points,
                &award.activity_type,
                award.metadata,
                Utc::now(),
            )
            .await?;
        self.evaluate_badges(fid, &[award.category]).await;
        Ok(score)
    }

    /// Perform a catalog action. Returns `None` while the action is cooling
    /// down.
    pub async fn record_action(
        &self,
        fid: Fid,
        action_id: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<UserScore>> {
        let action =
            find_action(action_id).ok_or_else(|| EngineError::UnknownAction(action_id.to_string()))?;
        let now = Utc::now();

        let award = PointsAward::new(action.category, action.points, action.activity_type)
            .with_metadata(metadata);
        let Some(score) = self
            .ledger
            .add_points_if(fid, &award, now, |last| action.can_perform(last, now))
            .await?
        else {
            info!(fid = fid, action = action.id, "Action still cooling down");
            return Ok(None);
        };
        self.touch_quietly(fid).await;
        self.evaluate_badges(fid, &[action.category]).await;
        Ok(Some(score))
    }

    pub async fn record_referral(&self, referrer: Fid, referee: Fid) -> Result<bool> {
        self.referrals.record(referrer, referee, Utc::now()).await
    }

    pub async fn referral_count(&self, referrer: Fid) -> Result<u64> {
        self.referrals.count(referrer).await
    }

    /// Mark the user active today for streak purposes.
    pub async fn touch_activity(&self, fid: Fid) -> Result<Streak> {
        self.streaks.touch(fid, Utc::now().date_naive()).await
    }

    /// Pay any completion whose reward was never applied.
    pub async fn reconcile_unpaid(&self, fid: Fid) -> Result<Vec<TaskCompletion>> {
        let paid = self.completions.reconcile(fid, Utc::now()).await?;
        if !paid.is_empty() {
            let mut categories: Vec<Category> = paid.iter().map(|c| c.category).collect();
            categories.push(Category::Player);
            self.evaluate_badges(fid, &categories).await;
        }
        Ok(paid)
    }

    /// Score one user's provider signals.
    pub async fn score_signals(&self, fid: Fid) -> Result<SignalOutcome> {
        self.scorer.score_user(fid, Utc::now()).await
    }

    /// Score signals for `fids`.
    pub async fn sweep(&self, fids: &[Fid]) -> SweepReport {
        self.sweep.run(fids).await
    }

    /// Score signals for every known user.
    pub async fn sweep_all(&self) -> Result<SweepReport> {
        let fids = self.known_fids().await?;
        Ok(self.sweep.run(&fids).await)
    }

    async fn touch_quietly(&self, fid: Fid) {
        if let Err(e) = self.touch_activity(fid).await {
            error!(fid = fid, error = %e, "Failed to update streak");
        }
    }

    /// Badge failures are logged, never returned.
    async fn evaluate_badges(&self, fid: Fid, categories: &[Category]) {
        let now = Utc::now();
        let mut seen = Vec::with_capacity(categories.len());
        for &category in categories {
            if seen.contains(&category) {
                continue;
            }
            seen.push(category);
            if let Err(e) = self.badges.evaluate(fid, category, now).await {
                error!(fid = fid, category = %category, error = %e, "Badge evaluation failed");
            }
        }
    }
}
