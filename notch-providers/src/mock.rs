//! Mock providers for testing.
//!
//! Each mock holds canned data that tests can extend after construction,
//! can be switched unavailable, can inject latency, and counts its calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use notch_core::Fid;

use crate::traits::*;

/// Shared switches for every mock.
struct MockControl {
    available: AtomicBool,
    call_count: AtomicU32,
    delay: Option<Duration>,
}

impl MockControl {
    fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            call_count: AtomicU32::new(0),
            delay: None,
        }
    }

    async fn enter(&self, name: &str) -> ProviderResult<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable(format!("{name} disabled")));
        }
        Ok(())
    }
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    match lock.read() {
        Ok(guard) => (*guard).clone(),
        Err(poisoned) => (*poisoned.into_inner()).clone(),
    }
}

fn write<T>(lock: &RwLock<T>, f: impl FnOnce(&mut T)) {
    match lock.write() {
        Ok(mut guard) => f(&mut *guard),
        Err(poisoned) => f(&mut *poisoned.into_inner()),
    }
}

// ---------------------------------------------------------------------------

/// Mock social graph.
pub struct MockSocialProvider {
    control: MockControl,
    posts: RwLock<HashMap<Fid, Vec<Post>>>,
    reactions: RwLock<HashMap<(Fid, ReactionKind), Vec<Reaction>>>,
}

impl MockSocialProvider {
    pub fn new() -> Self {
        Self {
            control: MockControl::new(),
            posts: RwLock::new(HashMap::new()),
            reactions: RwLock::new(HashMap::new()),
        }
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.set_available(available);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.control.delay = Some(delay);
        self
    }

    /// Add a post for `fid`.
    pub fn with_post(self, fid: Fid, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        self.push_post(
            fid,
            Post {
                hash: None,
                text: text.into(),
                timestamp,
                parent_id: None,
            },
        );
        self
    }

    pub fn push_post(&self, fid: Fid, post: Post) {
        write(&self.posts, |m| m.entry(fid).or_default().insert(0, post));
    }

    pub fn push_reaction(&self, fid: Fid, kind: ReactionKind, timestamp: DateTime<Utc>) {
        write(&self.reactions, |m| {
            m.entry((fid, kind))
                .or_default()
                .insert(0, Reaction { kind, timestamp })
        });
    }

    pub fn set_available(&self, available: bool) {
        self.control.available.store(available, Ordering::SeqCst);
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> u32 {
        self.control.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockSocialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocialProvider for MockSocialProvider {
    fn id(&self) -> &str {
        "mock-social"
    }

    async fn fetch_recent_posts(&self, fid: Fid, limit: u32) -> ProviderResult<Vec<Post>> {
        self.control.enter("mock social").await?;
        let mut posts = read(&self.posts).remove(&fid).unwrap_or_default();
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn fetch_recent_reactions(
        &self,
        fid: Fid,
        kind: ReactionKind,
        limit: u32,
    ) -> ProviderResult<Vec<Reaction>> {
        self.control.enter("mock social").await?;
        let mut reactions = read(&self.reactions).remove(&(fid, kind)).unwrap_or_default();
        reactions.truncate(limit as usize);
        Ok(reactions)
    }
}

// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct ChainData {
    addresses: HashMap<Fid, Vec<String>>,
    transfers: HashMap<String, Vec<Transfer>>,
    balances: HashMap<String, Vec<TokenBalance>>,
    nfts: HashMap<String, Vec<OwnedNft>>,
}

/// Mock chain indexer.
pub struct MockChainProvider {
    control: MockControl,
    network: String,
    data: RwLock<ChainData>,
}

impl MockChainProvider {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            control: MockControl::new(),
            network: network.into(),
            data: RwLock::new(ChainData::default()),
        }
    }

    pub fn with_available(self, available: bool) -> Self {
        self.set_available(available);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.control.delay = Some(delay);
        self
    }

    pub fn with_address(self, fid: Fid, address: impl Into<String>) -> Self {
        let address = address.into();
        write(&self.data, |d| d.addresses.entry(fid).or_default().push(address));
        self
    }

    /// Record a contract deployment sent from `address`.
    pub fn push_contract_creation(&self, address: &str, timestamp: DateTime<Utc>) {
        self.push_transfer(Transfer {
            hash: None,
            from: address.to_string(),
            to: None,
            value: None,
            asset: None,
            timestamp: Some(timestamp),
        });
    }

    /// Record a value transfer sent from `address`.
    pub fn push_swap(&self, address: &str, value: f64, timestamp: DateTime<Utc>) {
        self.push_transfer(Transfer {
            hash: None,
            from: address.to_string(),
            to: Some("0x000000000000000000000000000000000000dead".to_string()),
            value: Some(value),
            asset: Some("ETH".to_string()),
            timestamp: Some(timestamp),
        });
    }

    pub fn push_transfer(&self, transfer: Transfer) {
        write(&self.data, |d| {
            d.transfers
                .entry(transfer.from.clone())
                .or_default()
                .insert(0, transfer)
        });
    }

    pub fn set_token_balances(&self, address: &str, balances: Vec<TokenBalance>) {
        write(&self.data, |d| {
            d.balances.insert(address.to_string(), balances);
        });
    }

    pub fn set_nfts(&self, address: &str, nfts: Vec<OwnedNft>) {
        write(&self.data, |d| {
            d.nfts.insert(address.to_string(), nfts);
        });
    }

    pub fn set_available(&self, available: bool) {
        self.control.available.store(available, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.control.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainProvider for MockChainProvider {
    fn network(&self) -> &str {
        &self.network
    }

    async fn fetch_verified_addresses(&self, fid: Fid) -> ProviderResult<Vec<String>> {
        self.control.enter("mock chain").await?;
        Ok(read(&self.data).addresses.remove(&fid).unwrap_or_default())
    }

    async fn fetch_asset_transfers(
        &self,
        address: &str,
        filter: &TransferFilter,
    ) -> ProviderResult<Vec<Transfer>> {
        self.control.enter("mock chain").await?;
        let mut transfers = read(&self.data).transfers.remove(address).unwrap_or_default();
        transfers.truncate(filter.max_count as usize);
        Ok(transfers)
    }

    async fn fetch_token_balances(&self, address: &str) -> ProviderResult<Vec<TokenBalance>> {
        self.control.enter("mock chain").await?;
        Ok(read(&self.data).balances.remove(address).unwrap_or_default())
    }

    async fn fetch_owned_nfts(&self, address: &str) -> ProviderResult<Vec<OwnedNft>> {
        self.control.enter("mock chain").await?;
        Ok(read(&self.data).nfts.remove(address).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------

/// Mock attestation ledger.
pub struct MockAttestationProvider {
    control: MockControl,
    records: RwLock<Vec<(String, Attestation)>>,
}

impl MockAttestationProvider {
    pub fn new() -> Self {
        Self {
            control: MockControl::new(),
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn with_available(self, available: bool) -> Self {
        self.set_available(available);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.control.delay = Some(delay);
        self
    }

    /// Record an attestation for `recipient` under `schema_id`.
    pub fn push(&self, recipient: impl Into<String>, schema_id: &str, time_created: DateTime<Utc>) {
        let recipient = recipient.into();
        write(&self.records, |r| {
            let id = format!("0x{:04x}", r.len() + 1);
            r.push((
                recipient,
                Attestation {
                    id,
                    schema_id: Some(schema_id.to_string()),
                    time_created,
                },
            ))
        });
    }

    pub fn set_available(&self, available: bool) {
        self.control.available.store(available, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.control.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockAttestationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttestationProvider for MockAttestationProvider {
    fn id(&self) -> &str {
        "mock-attestations"
    }

    async fn query_attestations(
        &self,
        recipient: &str,
        schema_ids: &[String],
        since: DateTime<Utc>,
    ) -> ProviderResult<Vec<Attestation>> {
        self.control.enter("mock attestations").await?;
        Ok(read(&self.records)
            .into_iter()
            .filter(|(r, a)| {
                r == recipient
                    && a.time_created >= since
                    && a
                        .schema_id
                        .as_ref()
                        .is_some_and(|s| schema_ids.contains(s))
            })
            .map(|(_, a)| a)
            .collect())
    }
}
