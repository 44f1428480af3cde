//! Replay-cache providers.
//!
//! The node obtains its cache through a provider so deployments can swap
//! the backing store without touching the pipeline. The default provider
//! hands out the process-local map; the distributed provider wraps a
//! cluster-shared backend injected by the host. A distributed provider
//! left unconfigured is a fatal startup error, never a silent fallback to
//! the local map.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{CacheError, CacheResult};
use crate::replay::{AntiReplayCache, InMemoryReplayCache};

/// Obtains the anti-replay cache for this deployment.
pub trait ReplayCacheProvider: Send + Sync {
    /// Builds or returns the cache instance.
    fn new_anti_replay_cache(&self) -> CacheResult<Arc<dyn AntiReplayCache>>;
}

/// Default provider: process-local cache, suitable for single-instance
/// deployments.
#[derive(Debug)]
pub struct DefaultReplayCacheProvider {
    retention: Duration,
}

impl DefaultReplayCacheProvider {
    /// Creates a provider with the given retention window.
    #[must_use]
    pub const fn new(retention: Duration) -> Self {
        Self { retention }
    }
}

impl ReplayCacheProvider for DefaultReplayCacheProvider {
    fn new_anti_replay_cache(&self) -> CacheResult<Arc<dyn AntiReplayCache>> {
        Ok(Arc::new(InMemoryReplayCache::new(self.retention)))
    }
}

/// Distributed provider: wraps a cluster-shared backend supplied by the
/// host layer (the cluster client itself is out of scope here).
pub struct DistributedReplayCacheProvider {
    backend: Option<Arc<dyn AntiReplayCache>>,
}

impl DistributedReplayCacheProvider {
    /// Creates a provider around an injected cluster backend.
    #[must_use]
    pub fn new(backend: Arc<dyn AntiReplayCache>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Creates an unconfigured provider. Useful for wiring that resolves
    /// the backend later; obtaining a cache from it fails.
    #[must_use]
    pub const fn unconfigured() -> Self {
        Self { backend: None }
    }
}

impl ReplayCacheProvider for DistributedReplayCacheProvider {
    fn new_anti_replay_cache(&self) -> CacheResult<Arc<dyn AntiReplayCache>> {
        self.backend.clone().ok_or_else(|| {
            CacheError::Configuration(
                "distributed replay cache has no backing map; check the cluster configuration"
                    .to_string(),
            )
        })
    }
}
