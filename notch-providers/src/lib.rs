//! Notch Providers - external data capabilities
//!
//! The scoring engine consumes three remote capabilities through the traits
//! in [`traits`]:
//!
//! - **Social graph** ([`SocialProvider`]): recent posts and reactions
//! - **Chain data** ([`ChainProvider`]): verified addresses, transfers,
//!   token balances and NFTs for one network
//! - **Attestations** ([`AttestationProvider`]): schema-filtered attestation
//!   queries
//!
//! HTTP adapters for Neynar, Alchemy and EAS live beside configurable
//! mocks and a [`DisabledProvider`] for unconfigured capabilities.

pub mod alchemy;
pub mod disabled;
pub mod eas;
pub mod mock;
pub mod neynar;
pub mod traits;

pub use alchemy::{AddressDirectory, AlchemyClient};
pub use disabled::DisabledProvider;
pub use eas::EasClient;
pub use mock::{MockAttestationProvider, MockChainProvider, MockSocialProvider};
pub use neynar::NeynarClient;
pub use traits::*;
