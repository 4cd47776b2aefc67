//! Social-activity check.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use notch_core::{Fid, SocialRequirement};
use notch_providers::{Post, ProviderResult, SocialProvider};

use super::VerificationStrategy;

/// Passes when a recent post contains a keyword and is long enough.
pub struct SocialActivityStrategy {
    provider: Arc<dyn SocialProvider>,
    lookback: Duration,
    scan_limit: u32,
}

impl SocialActivityStrategy {
    pub fn new(provider: Arc<dyn SocialProvider>, lookback: Duration, scan_limit: u32) -> Self {
        Self {
            provider,
            lookback,
            scan_limit,
        }
    }
}

fn qualifies(post: &Post, keywords: &[String], min_length: usize) -> bool {
    if post.text.chars().count() < min_length {
        return false;
    }
    let text = post.text.to_lowercase();
    keywords.iter().any(|k| text.contains(k.as_str()))
}

#[async_trait]
impl VerificationStrategy<SocialRequirement> for SocialActivityStrategy {
    fn name(&self) -> &str {
        "social"
    }

    async fn check(
        &self,
        fid: Fid,
        requirement: &SocialRequirement,
        now: DateTime<Utc>,
    ) -> ProviderResult<bool> {
        let keywords: Vec<String> = requirement
            .keywords
            .iter()
            .map(|k| k.to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Ok(false);
        }

        let since = now - self.lookback;
        let posts = self.provider.fetch_recent_posts(fid, self.scan_limit).await?;
        Ok(posts
            .iter()
            .filter(|p| p.timestamp >= since && p.timestamp <= now)
            .any(|p| qualifies(p, &keywords, requirement.min_length)))
    }
}
