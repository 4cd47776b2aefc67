//! Activity signal scoring.
//!
//! Turns what the providers report about a user since the last sweep into
//! ledger awards, one log entry per event. Each category keeps its own
//! watermark, advanced only after the category's awards are applied, and
//! a per-day allowance that caps how many points it can earn.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use notch_core::{Category, Fid};
use notch_providers::{
    fid_recipient, AttestationProvider, ChainProvider, OwnedNft, ProviderError, ProviderResult,
    ReactionKind, SocialProvider, TokenBalance, Transfer, TransferFilter,
};

use crate::activity::ActivityLog;
use crate::badges::BadgeEvaluator;
use crate::config::SignalsConfig;
use crate::ledger::ScoreLedger;
use crate::store::{keys, KvStore, ScoreStore};
use crate::streak::StreakTracker;
use crate::types::{PointsAward, Result};

const POST_POINTS: u64 = 5;
const REPLY_POINTS: u64 = 3;
const LIKE_POINTS: u64 = 1;
const RECAST_POINTS: u64 = 2;
const DEPLOY_POINTS: u64 = 50;
const SWAP_POINTS: u64 = 5;
const TOKEN_HOLDING_CAP: u64 = 50;
const NFT_HOLDING_CAP: u64 = 100;
const NFT_POINTS: u64 = 2;
const STREAK_DAY_POINTS: u64 = 2;
const STREAK_WEEK_POINTS: u64 = 10;
const MINIAPP_POINTS: u64 = 5;
const MISSION_POINTS: u64 = 30;

/// Activity type for the daily streak award.
pub const STREAK_ACTIVITY: &str = "streak";

/// Distinct assets held at the last sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Holdings {
    tokens: u64,
    nfts: u64,
}

impl Holdings {
    fn from_assets(balances: &[TokenBalance], nfts: &[OwnedNft]) -> Self {
        let tokens: HashSet<String> = balances
            .iter()
            .filter(|b| !is_zero_balance(&b.balance))
            .map(|b| b.contract_address.to_lowercase())
            .collect();
        let nfts: HashSet<(String, &str)> = nfts
            .iter()
            .map(|n| (n.contract_address.to_lowercase(), n.token_id.as_str()))
            .collect();
        Self {
            tokens: tokens.len() as u64,
            nfts: nfts.len() as u64,
        }
    }

    /// Points for growth since `previous`. Shrinking holdings earn nothing.
    fn growth_points(&self, previous: &Holdings) -> u64 {
        let tokens = self
            .tokens
            .min(TOKEN_HOLDING_CAP)
            .saturating_sub(previous.tokens.min(TOKEN_HOLDING_CAP));
        let nfts = self
            .nfts
            .min(NFT_HOLDING_CAP)
            .saturating_sub(previous.nfts.min(NFT_HOLDING_CAP));
        tokens + NFT_POINTS * nfts
    }
}

fn is_zero_balance(raw: &str) -> bool {
    let digits = raw.trim().trim_start_matches("0x");
    digits.is_empty() || digits.chars().all(|c| c == '0')
}

/// Chain data for one user, fetched once per sweep.
#[derive(Debug, Default)]
struct ChainActivity {
    transfers: Vec<(String, Transfer)>,
    holdings: Holdings,
}

/// Result of scoring one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalOutcome {
    pub fid: Fid,
    /// Awards applied, after daily caps
    pub awarded: Vec<PointsAward>,
    pub points: u64,
    /// Categories skipped because a provider failed
    pub skipped: Vec<(Category, String)>,
}

pub struct SignalScorer {
    ledger: Arc<ScoreLedger>,
    store: Arc<dyn ScoreStore>,
    kv: Arc<dyn KvStore>,
    activity: ActivityLog,
    badges: BadgeEvaluator,
    streaks: StreakTracker,
    social: Arc<dyn SocialProvider>,
    chain: Arc<dyn ChainProvider>,
    attestations: Arc<dyn AttestationProvider>,
    config: SignalsConfig,
    partner_schema_ids: Vec<String>,
    retention: Duration,
}

impl SignalScorer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<ScoreLedger>,
        kv: Arc<dyn KvStore>,
        streaks: StreakTracker,
        social: Arc<dyn SocialProvider>,
        chain: Arc<dyn ChainProvider>,
        attestations: Arc<dyn AttestationProvider>,
        config: SignalsConfig,
        partner_schema_ids: Vec<String>,
        retention: Duration,
    ) -> Self {
        let store = ledger.store().clone();
        Self {
            activity: ActivityLog::new(store.clone()),
            badges: BadgeEvaluator::new(store.clone()),
            store,
            ledger,
            kv,
            streaks,
            social,
            chain,
            attestations,
            config,
            partner_schema_ids,
            retention,
        }
    }

    /// Score everything reported for `fid` since the last sweep.
    ///
    /// A provider failure skips its category and leaves the watermark in
    /// place; storage failures are returned.
    pub async fn score_user(&self, fid: Fid, now: DateTime<Utc>) -> Result<SignalOutcome> {
        let mut outcome = SignalOutcome {
            fid,
            ..Default::default()
        };
        let chain = self.chain_activity(fid).await;

        for category in Category::ALL {
            let since = self.watermark(fid, category, now).await?;
            let detected = match category {
                Category::Social => self.social_awards(fid, since, now).await,
                Category::Builder => match &chain {
                    Ok(chain) => Ok(builder_awards(chain, since, now)),
                    Err(e) => Err(ProviderError::Unavailable(e.to_string())),
                },
                Category::Degen => match &chain {
                    Ok(chain) => self.degen_awards(fid, chain, since, now).await,
                    Err(e) => Err(ProviderError::Unavailable(e.to_string())),
                },
                Category::Player => self.player_awards(fid, since, now).await,
            };

            let awards = match detected {
                Ok(awards) => awards,
                Err(e) => {
                    warn!(fid = fid, category = %category, error = %e, "Signal source failed, category skipped");
                    outcome.skipped.push((category, e.to_string()));
                    continue;
                }
            };

            let applied = self.apply_capped(fid, category, awards, now).await?;
            if category == Category::Degen {
                if let Ok(chain) = &chain {
                    self.kv
                        .set_json(&keys::holdings(fid), &chain.holdings, self.retention)
                        .await?;
                }
            }
            self.kv
                .set_json(&keys::signal_watermark(fid, category), &now, self.retention)
                .await?;

            if !applied.is_empty() {
                if let Err(e) = self.badges.evaluate(fid, category, now).await {
                    error!(fid = fid, category = %category, error = %e, "Badge evaluation failed");
                }
            }
            outcome.points += applied.iter().map(|a| a.points).sum::<u64>();
            outcome.awarded.extend(applied);
        }

        if outcome.points > 0 {
            info!(fid = fid, points = outcome.points, awards = outcome.awarded.len(), "Signals scored");
        }
        Ok(outcome)
    }

    async fn watermark(
        &self,
        fid: Fid,
        category: Category,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let stored: Option<DateTime<Utc>> =
            self.kv.get_json(&keys::signal_watermark(fid, category)).await?;
        Ok(stored.unwrap_or(now - ChronoDuration::hours(self.config.initial_lookback_hours)))
    }

    /// Apply awards in order until the category's daily allowance runs out.
    /// The award that crosses the cap is trimmed to fit.
    async fn apply_capped(
        &self,
        fid: Fid,
        category: Category,
        awards: Vec<PointsAward>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PointsAward>> {
        if awards.is_empty() {
            return Ok(Vec::new());
        }
        let key = keys::daily_allowance(fid, category, now.date_naive());
        let mut used = self.kv.get_json::<u64>(&key).await?.unwrap_or(0);
        let cap = self.config.daily_cap(category);

        let mut applied = Vec::new();
        for mut award in awards {
            let remaining = cap.saturating_sub(used);
            if remaining == 0 {
                debug!(fid = fid, category = %category, cap = cap, "Daily cap reached");
                break;
            }
            award.points = award.points.min(remaining);
            if award.points == 0 {
                continue;
            }
            self.ledger
                .add_points(
                    fid,
                    category,
                    award.points,
                    &award.activity_type,
                    award.metadata.clone(),
                    now,
                )
                .await?;
            used += award.points;
            applied.push(award);
        }

        self.kv
            .set_json(&key, &used, Duration::from_secs(2 * 24 * 60 * 60))
            .await?;
        Ok(applied)
    }

    async fn social_awards(
        &self,
        fid: Fid,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ProviderResult<Vec<PointsAward>> {
        let in_window = |t: DateTime<Utc>| t > since && t <= now;
        let mut awards = Vec::new();

        let mut posts = self.social.fetch_recent_posts(fid, self.config.post_limit).await?;
        posts.retain(|p| in_window(p.timestamp));
        posts.sort_by_key(|p| p.timestamp);
        for post in posts {
            let (activity_type, points) = if post.is_reply() {
                ("reply", REPLY_POINTS)
            } else {
                ("publish", POST_POINTS)
            };
            awards.push(
                PointsAward::new(Category::Social, points, activity_type)
                    .with_metadata(serde_json::json!({ "hash": post.hash, "at": post.timestamp })),
            );
        }

        for (kind, points) in [(ReactionKind::Like, LIKE_POINTS), (ReactionKind::Recast, RECAST_POINTS)] {
            let reactions = self
                .social
                .fetch_recent_reactions(fid, kind, self.config.reaction_limit)
                .await?;
            for reaction in reactions.into_iter().filter(|r| in_window(r.timestamp)) {
                awards.push(
                    PointsAward::new(Category::Social, points, "interact").with_metadata(
                        serde_json::json!({ "kind": kind.as_str(), "at": reaction.timestamp }),
                    ),
                );
            }
        }
        Ok(awards)
    }

    async fn chain_activity(&self, fid: Fid) -> ProviderResult<ChainActivity> {
        let addresses = self.chain.fetch_verified_addresses(fid).await?;
        let filter = TransferFilter {
            max_count: self.config.transfer_limit,
        };

        let mut activity = ChainActivity::default();
        let mut balances = Vec::new();
        let mut nfts = Vec::new();
        let mut failures = 0usize;
        let mut last_error = None;

        for address in &addresses {
            let fetched = async {
                let transfers = self.chain.fetch_asset_transfers(address, &filter).await?;
                let tokens = self.chain.fetch_token_balances(address).await?;
                let owned = self.chain.fetch_owned_nfts(address).await?;
                Ok::<_, ProviderError>((transfers, tokens, owned))
            }
            .await;
            match fetched {
                Ok((transfers, tokens, owned)) => {
                    activity
                        .transfers
                        .extend(transfers.into_iter().map(|t| (address.clone(), t)));
                    balances.extend(tokens);
                    nfts.extend(owned);
                }
                Err(e) => {
                    warn!(fid = fid, address = %address, error = %e, "Chain lookup failed");
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            if failures == addresses.len() {
                return Err(e);
            }
        }
        activity.holdings = Holdings::from_assets(&balances, &nfts);
        Ok(activity)
    }

    async fn degen_awards(
        &self,
        fid: Fid,
        chain: &ChainActivity,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ProviderResult<Vec<PointsAward>> {
        let mut swaps: Vec<_> = chain
            .transfers
            .iter()
            .filter(|(_, t)| !t.is_contract_creation() && t.exceeds(0.0))
            .filter_map(|(address, t)| {
                let at = t.timestamp.filter(|at| *at > since && *at <= now)?;
                Some((at, address, t))
            })
            .collect();
        swaps.sort_by_key(|(at, _, _)| *at);

        let mut awards: Vec<PointsAward> = swaps
            .into_iter()
            .map(|(at, address, t)| {
                PointsAward::new(Category::Degen, SWAP_POINTS, "swap").with_metadata(
                    serde_json::json!({ "address": address, "hash": t.hash, "value": t.value, "at": at }),
                )
            })
            .collect();

        let previous = self
            .kv
            .get_json::<Holdings>(&keys::holdings(fid))
            .await
            .map_err(|e| ProviderError::Unavailable(format!("holdings cache: {e}")))?
            .unwrap_or_default();
        let growth = chain.holdings.growth_points(&previous);
        if growth > 0 {
            awards.push(PointsAward::new(Category::Degen, growth, "hold").with_metadata(
                serde_json::json!({ "tokens": chain.holdings.tokens, "nfts": chain.holdings.nfts }),
            ));
        }
        Ok(awards)
    }

    async fn player_awards(
        &self,
        fid: Fid,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ProviderResult<Vec<PointsAward>> {
        let mut awards = Vec::new();
        let today = now.date_naive();

        let days = self
            .streaks
            .current_days(fid, today)
            .await
            .map_err(|e| ProviderError::Unavailable(format!("streak store: {e}")))?;
        let last_streak_award = self
            .activity
            .last_of_type(fid, STREAK_ACTIVITY)
            .await
            .map_err(|e| ProviderError::Unavailable(format!("activity log: {e}")))?;
        if days > 0 && last_streak_award.map(|t| t.date_naive()) != Some(today) {
            let mut points = STREAK_DAY_POINTS;
            if days % 7 == 0 {
                points += STREAK_WEEK_POINTS;
            }
            awards.push(
                PointsAward::new(Category::Player, points, STREAK_ACTIVITY)
                    .with_metadata(serde_json::json!({ "days": days })),
            );
        }

        if !self.partner_schema_ids.is_empty() {
            let mut found = self
                .attestations
                .query_attestations(&fid_recipient(fid), &self.partner_schema_ids, since)
                .await?;
            found.retain(|a| a.time_created > since && a.time_created <= now);
            found.sort_by_key(|a| a.time_created);
            for attestation in found {
                awards.push(
                    PointsAward::new(Category::Player, MINIAPP_POINTS, "miniapp").with_metadata(
                        serde_json::json!({ "attestation": attestation.id, "schema": attestation.schema_id }),
                    ),
                );
            }
        }

        let completions = self
            .store
            .completions(fid)
            .await
            .map_err(|e| ProviderError::Unavailable(format!("completion store: {e}")))?;
        for completion in completions
            .into_iter()
            .filter(|c| c.completed_at > since && c.completed_at <= now)
        {
            awards.push(
                PointsAward::new(Category::Player, MISSION_POINTS, "mission_bonus")
                    .with_metadata(serde_json::json!({ "taskId": completion.task_id })),
            );
        }
        Ok(awards)
    }
}

fn builder_awards(chain: &ChainActivity, since: DateTime<Utc>, now: DateTime<Utc>) -> Vec<PointsAward> {
    let mut deploys: Vec<_> = chain
        .transfers
        .iter()
        .filter(|(_, t)| t.is_contract_creation())
        .filter_map(|(address, t)| {
            let at = t.timestamp.filter(|at| *at > since && *at <= now)?;
            Some((at, address, t))
        })
        .collect();
    deploys.sort_by_key(|(at, _, _)| *at);
    deploys
        .into_iter()
        .map(|(at, address, t)| {
            PointsAward::new(Category::Builder, DEPLOY_POINTS, "deploy")
                .with_metadata(serde_json::json!({ "address": address, "hash": t.hash, "at": at }))
        })
        .collect()
}
