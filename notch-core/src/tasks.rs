//! Task catalog types.
//!
//! A task is a time-bounded, point-rewarding challenge. Each task names
//! exactly one verification method, with method-specific parameters carried
//! in the tagged [`VerificationConfig`] union.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::types::{Category, Fid};

/// Recurrence bucket a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum TaskSchedule {
    Daily,
    Weekly,
    Special,
}

impl TaskSchedule {
    /// Length of the activity window for freshly generated tasks.
    pub fn window(&self) -> Duration {
        match self {
            TaskSchedule::Daily => Duration::days(1),
            TaskSchedule::Weekly => Duration::days(7),
            TaskSchedule::Special => Duration::days(30),
        }
    }

    /// Start of the window containing `now`: UTC midnight for daily and
    /// special tasks, Monday midnight for weekly ones.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        match self {
            TaskSchedule::Weekly => {
                midnight - Duration::days(i64::from(now.weekday().num_days_from_monday()))
            }
            TaskSchedule::Daily | TaskSchedule::Special => midnight,
        }
    }
}

/// Which verification strategy a task uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Social,
    Onchain,
    Attestation,
    Referral,
}

/// On-chain event a task looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum OnchainEventType {
    /// A transaction with no recipient address
    ContractCreation,
    /// A transfer whose value exceeds the configured minimum
    TokenSwap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SocialRequirement {
    /// Case-insensitive; any one match suffices
    pub keywords: Vec<String>,
    /// Minimum post length in characters
    #[serde(default)]
    pub min_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct OnchainRequirement {
    pub network: String,
    pub event_type: OnchainEventType,
    #[serde(default)]
    pub min_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AttestationRequirement {
    pub schema_ids: Vec<String>,
    #[serde(default = "default_min_attestations")]
    pub min_attestations: u32,
}

fn default_min_attestations() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ReferralRequirement {
    pub min_referrals: u32,
}

/// Method-specific verification parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum VerificationConfig {
    Social(SocialRequirement),
    Onchain(OnchainRequirement),
    Attestation(AttestationRequirement),
    Referral(ReferralRequirement),
}

impl VerificationConfig {
    pub fn method(&self) -> VerificationMethod {
        match self {
            VerificationConfig::Social(_) => VerificationMethod::Social,
            VerificationConfig::Onchain(_) => VerificationMethod::Onchain,
            VerificationConfig::Attestation(_) => VerificationMethod::Attestation,
            VerificationConfig::Referral(_) => VerificationMethod::Referral,
        }
    }
}

/// A claimable task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    /// Fixed reward
    pub points: u64,
    pub schedule: TaskSchedule,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub verification: VerificationConfig,
    pub active: bool,
}

impl TaskDefinition {
    pub fn verification_method(&self) -> VerificationMethod {
        self.verification.method()
    }

    /// Active and `now` within `[start_date, end_date]`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.active && self.start_date <= now && now <= self.end_date
    }

    /// This task with its window moved to the schedule window containing `now`.
    pub fn anchored_at(&self, now: DateTime<Utc>) -> Self {
        let start = self.schedule.window_start(now);
        Self {
            start_date: start,
            end_date: start + self.schedule.window(),
            ..self.clone()
        }
    }
}

/// Proof that `fid` completed `task_id`. At most one per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    pub fid: Fid,
    pub task_id: String,
    pub category: Category,
    pub points: u64,
    pub completed_at: DateTime<Utc>,
    #[cfg_attr(feature = "typescript", ts(type = "Record<string, unknown>"))]
    pub verification_data: serde_json::Value,
    /// Whether the reward has been applied to the score ledger
    #[serde(default)]
    pub points_awarded: bool,
}

impl TaskCompletion {
    pub fn new(
        fid: Fid,
        task: &TaskDefinition,
        verification_data: serde_json::Value,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fid,
            task_id: task.id.clone(),
            category: task.category,
            points: task.points,
            completed_at,
            verification_data,
            points_awarded: false,
        }
    }
}

struct CatalogEntry {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    category: Category,
    points: u64,
    schedule: TaskSchedule,
}

fn task(entry: CatalogEntry, verification: VerificationConfig, now: DateTime<Utc>) -> TaskDefinition {
    let start = entry.schedule.window_start(now);
    TaskDefinition {
        id: entry.id.to_string(),
        title: entry.title.to_string(),
        description: entry.description.to_string(),
        category: entry.category,
        points: entry.points,
        schedule: entry.schedule,
        start_date: start,
        end_date: start + entry.schedule.window(),
        verification,
        active: true,
    }
}

/// The built-in task set, with windows anchored on `now`.
pub fn default_catalog(now: DateTime<Utc>) -> Vec<TaskDefinition> {
    vec![
        task(
            CatalogEntry {
                id: "daily-cast-notch",
                title: "Share about Notch",
                description: "Post a cast mentioning @notch or #notch",
                category: Category::Social,
                points: 25,
                schedule: TaskSchedule::Daily,
            },
            VerificationConfig::Social(SocialRequirement {
                keywords: vec!["notch".into(), "@notch".into(), "#notch".into()],
                min_length: 10,
            }),
            now,
        ),
        task(
            CatalogEntry {
                id: "daily-swap",
                title: "Make a Swap",
                description: "Execute any token swap on Base network",
                category: Category::Degen,
                points: 15,
                schedule: TaskSchedule::Daily,
            },
            VerificationConfig::Onchain(OnchainRequirement {
                network: "base".into(),
                event_type: OnchainEventType::TokenSwap,
                min_value: Some(0.001),
            }),
            now,
        ),
        task(
            CatalogEntry {
                id: "weekly-deploy",
                title: "Deploy on Base",
                description: "Deploy any smart contract on Base network",
                category: Category::Builder,
                points: 100,
                schedule: TaskSchedule::Weekly,
            },
            VerificationConfig::Onchain(OnchainRequirement {
                network: "base".into(),
                event_type: OnchainEventType::ContractCreation,
                min_value: None,
            }),
            now,
        ),
        task(
            CatalogEntry {
                id: "weekly-partner-app",
                title: "Try Partner App",
                description: "Use any partner miniapp and complete an action",
                category: Category::Player,
                points: 30,
                schedule: TaskSchedule::Weekly,
            },
            VerificationConfig::Attestation(AttestationRequirement {
                // Partner schema ids are supplied through configuration
                schema_ids: Vec::new(),
                min_attestations: 1,
            }),
            now,
        ),
        task(
            CatalogEntry {
                id: "invite-friends",
                title: "Invite Friends",
                description: "Invite 3 friends to Notch",
                category: Category::Player,
                points: 50,
                schedule: TaskSchedule::Special,
            },
            VerificationConfig::Referral(ReferralRequirement { min_referrals: 3 }),
            now,
        ),
    ]
}
