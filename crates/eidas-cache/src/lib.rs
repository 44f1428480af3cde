//! # eidas-cache
//!
//! Anti-replay cache for SAML message identifiers.
//!
//! The cache is the single mandatory synchronization point of the node:
//! every inbound message performs one atomic check-and-insert keyed by
//! `(message id, origin country)`. Two backends exist behind one trait, a
//! process-local map with TTL eviction and a distributed backend supplied
//! by the deployment for multi-instance clusters.

#![forbid(unsafe_code)]

pub mod error;
pub mod provider;
pub mod replay;

pub use error::{CacheError, CacheResult};
pub use provider::{
    DefaultReplayCacheProvider, DistributedReplayCacheProvider, ReplayCacheProvider,
};
pub use replay::{AntiReplayCache, InMemoryReplayCache};
