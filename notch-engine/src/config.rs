//! Configuration for the Notch engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use notch_core::season::{DEFAULT_SEASON_DAYS, DEFAULT_SEASON_START};
use notch_core::{Category, SeasonClock};

/// Configuration for a [`NotchEngine`](crate::NotchEngine).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Season clock
    pub season: SeasonConfig,
    /// Verification strategies
    pub verification: VerificationSettings,
    /// Signal scoring
    pub signals: SignalsConfig,
    /// Key-value retention
    pub retention: RetentionConfig,
    /// Batch sweep worker
    pub worker: WorkerConfig,
    /// Task catalog
    pub tasks: TasksConfig,
    /// External providers
    pub providers: ProvidersConfig,
    /// Ledger storage
    pub store: StoreConfig,
}

impl EngineConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Season configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    /// Start of season 1
    pub first_start: DateTime<Utc>,
    /// Season length in days
    pub length_days: u32,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            first_start: DateTime::from_timestamp(DEFAULT_SEASON_START, 0).unwrap_or_default(),
            length_days: DEFAULT_SEASON_DAYS,
        }
    }
}

impl SeasonConfig {
    pub fn clock(&self) -> SeasonClock {
        SeasonClock::new(self.first_start, self.length_days)
    }
}

/// Verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
    /// Deadline for one strategy call (ms)
    pub timeout_ms: u64,
    /// How far back qualifying posts may be (hours)
    pub social_lookback_hours: i64,
    /// How far back qualifying attestations may be (hours)
    pub attestation_lookback_hours: i64,
    /// Posts fetched per social check
    pub post_scan_limit: u32,
    /// Transfers fetched per address
    pub transfer_scan_depth: u32,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            social_lookback_hours: 24,
            attestation_lookback_hours: 24,
            post_scan_limit: 50,
            transfer_scan_depth: 20,
        }
    }
}

impl VerificationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Signal scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalsConfig {
    /// Daily cap on Social points
    pub social_daily_cap: u64,
    /// Daily cap on Builder points
    pub builder_daily_cap: u64,
    /// Daily cap on Degen points
    pub degen_daily_cap: u64,
    /// Daily cap on Player points
    pub player_daily_cap: u64,
    /// Look-back for a user's first sweep (hours)
    pub initial_lookback_hours: i64,
    /// Posts fetched per sweep
    pub post_limit: u32,
    /// Reactions fetched per kind per sweep
    pub reaction_limit: u32,
    /// Transfers fetched per address per sweep
    pub transfer_limit: u32,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            social_daily_cap: 50,
            builder_daily_cap: 200,
            degen_daily_cap: 150,
            player_daily_cap: 100,
            initial_lookback_hours: 24,
            post_limit: 150,
            reaction_limit: 100,
            transfer_limit: 100,
        }
    }
}

impl SignalsConfig {
    pub fn daily_cap(&self, category: Category) -> u64 {
        match category {
            Category::Social => self.social_daily_cap,
            Category::Builder => self.builder_daily_cap,
            Category::Degen => self.degen_daily_cap,
            Category::Player => self.player_daily_cap,
        }
    }
}

/// Retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// TTL for streaks and completed-task sets (days)
    pub kv_days: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { kv_days: 30 }
    }
}

impl RetentionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.kv_days * 24 * 60 * 60)
    }
}

/// Sweep worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Users scored concurrently
    pub concurrency: usize,
    /// Deadline for one user (ms)
    pub per_user_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            per_user_timeout_ms: 30_000,
        }
    }
}

impl WorkerConfig {
    pub fn per_user_timeout(&self) -> Duration {
        Duration::from_millis(self.per_user_timeout_ms)
    }
}

/// Task catalog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    /// Attestation schemas counted as partner-app usage
    pub partner_schema_ids: Vec<String>,
}

/// External provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Social graph API base URL
    pub social_url: String,
    /// Social graph API key
    pub social_api_key: Option<String>,
    /// Chain data API base URL
    pub chain_url: String,
    /// Chain data API key
    pub chain_api_key: Option<String>,
    /// Network the chain provider indexes
    pub chain_network: String,
    /// Attestation GraphQL endpoint
    pub attestation_url: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            social_url: notch_providers::neynar::DEFAULT_NEYNAR_URL.to_string(),
            social_api_key: None,
            chain_url: notch_providers::alchemy::DEFAULT_BASE_MAINNET_URL.to_string(),
            chain_api_key: None,
            chain_network: "base".to_string(),
            attestation_url: notch_providers::eas::DEFAULT_EAS_BASE_URL.to_string(),
        }
    }
}

/// Ledger backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sled,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database directory for the sled backend
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("notch-data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.signals.daily_cap(Category::Social), 50);
        assert_eq!(config.signals.daily_cap(Category::Builder), 200);
        assert_eq!(config.retention.kv_days, 30);
        assert_eq!(config.verification.transfer_scan_depth, 20);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.season.clock(), SeasonClock::default());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = EngineConfig::default();
        config.tasks.partner_schema_ids = vec!["0xpartner".to_string()];
        let yaml = config.to_yaml().unwrap();
        let parsed = EngineConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.tasks.partner_schema_ids, vec!["0xpartner"]);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "worker:\n  concurrency: 2\nstore:\n  backend: sled\n  path: /tmp/notch\n";
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.worker.per_user_timeout_ms, 30_000);
        assert_eq!(config.store.backend, StoreBackend::Sled);
        assert_eq!(config.signals.player_daily_cap, 100);
    }
}
