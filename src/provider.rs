//! Memoizing key/value facade over the composite resolver.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::resolver::CompositeResolver;
use crate::types::SecretString;

/// The key/value provider consumed by the host application.
///
/// Wraps a [`CompositeResolver`] with a per-process cache: the first lookup
/// of a key resolves it against the backend chain, every later lookup is
/// served from memory. Confirmed absence is cached too, so a known-missing
/// key never re-queries the backends. There is no TTL, eviction, or
/// invalidation; secrets are assumed stable for the process lifetime.
///
/// A missing key is `Ok(None)`, never an error; the host falls back to its
/// own default-resolution chain. Only successful outcomes are cached:
/// a backend failure leaves the key unresolved for a later retry.
pub struct SecretProvider {
    resolver: CompositeResolver,
    cache: RwLock<HashMap<String, Option<SecretString>>>,
}

impl std::fmt::Debug for SecretProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretProvider").field("resolver", &self.resolver).finish()
    }
}

impl SecretProvider {
    pub fn new(resolver: CompositeResolver) -> Self {
        Self { resolver, cache: RwLock::new(HashMap::new()) }
    }

    /// Build a provider straight from configuration records.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Ok(Self::new(CompositeResolver::from_config(config)?))
    }

    /// Look up one key, resolving and memoizing on first use.
    pub async fn get(&self, key: &str) -> Result<Option<SecretString>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(key) {
                tracing::trace!(key, "Cache hit");
                return Ok(cached.clone());
            }
        }

        // Racing startup reads may resolve the same key more than once;
        // both arrive at the same value and the last write is a no-op.
        let resolved = self.resolver.resolve(key).await?;

        let mut cache = self.cache.write().await;
        cache.insert(key.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Bulk startup load: merge every backend's enumerable entries in
    /// priority order, prime the cache with them, and return the mapping.
    ///
    /// Keys already cached (via [`SecretProvider::get`]) keep their cached
    /// outcome.
    pub async fn load_all(&self) -> Result<HashMap<String, SecretString>> {
        let merged = self.resolver.load_all().await?;

        let mut cache = self.cache.write().await;
        for (key, value) in &merged {
            cache.entry(key.clone()).or_insert_with(|| Some(value.clone()));
        }
        tracing::info!(entries = merged.len(), "Bulk-loaded secrets into cache");
        Ok(merged)
    }

    /// The wrapped resolver, for health checks and diagnostics.
    pub fn resolver(&self) -> &CompositeResolver {
        &self.resolver
    }

    /// Number of memoized outcomes (present and confirmed-absent).
    pub async fn cache_size(&self) -> usize {
        self.cache.read().await.len()
    }
}
