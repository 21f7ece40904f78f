//! Ordered multi-backend resolution with fallback.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backends::{build_backends, SecretBackend};
use crate::config::{ErrorPolicy, ResolverConfig, ResolverOptions};
use crate::error::Result;
use crate::types::SecretString;

/// Resolves flat configuration keys against an ordered backend chain.
///
/// Backends are consulted strictly in configured order; the first one that
/// holds the key wins and later backends are never queried. A backend
/// *failure* (as opposed to a clean miss) is handled per
/// [`ErrorPolicy`]: skipped with a warning by default, or fatal when the
/// policy is `Abort`. Exhausting the chain is not an error: the key is
/// simply unset and the host's own configuration defaults apply.
///
/// The backend list is immutable for the resolver's lifetime, so repeated
/// resolution of a key against unchanged backend state is deterministic.
pub struct CompositeResolver {
    backends: Vec<Arc<dyn SecretBackend>>,
    options: ResolverOptions,
    cancel: CancellationToken,
}

impl std::fmt::Debug for CompositeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeResolver")
            .field("backends", &self.backend_names())
            .field("options", &self.options)
            .finish()
    }
}

impl CompositeResolver {
    /// Create a resolver over explicitly constructed backends, highest
    /// priority first.
    pub fn new(backends: Vec<Arc<dyn SecretBackend>>, options: ResolverOptions) -> Self {
        Self { backends, options, cancel: CancellationToken::new() }
    }

    /// Build a resolver from configuration records. Validation failures
    /// are fatal here.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        config.options.validate()?;
        let backends = build_backends(&config.backends, &config.options)?;
        Ok(Self::new(backends, config.options.clone()))
    }

    /// Tie this resolver to the host's startup cancellation token. A
    /// resolution in flight when the token fires returns absent, never a
    /// partial result.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Backend names in priority order.
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve one key. `Ok(None)` means no backend holds it.
    pub async fn resolve(&self, key: &str) -> Result<Option<SecretString>> {
        for backend in &self.backends {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(key, "Resolution cancelled, returning absent");
                    return Ok(None);
                }
                outcome = backend.try_get(key) => outcome,
            };

            match outcome {
                Ok(Some(value)) => {
                    tracing::debug!(key, backend = backend.name(), "Resolved secret");
                    return Ok(Some(value));
                }
                Ok(None) => {
                    tracing::trace!(key, backend = backend.name(), "Key absent, falling through");
                }
                Err(err)
                    if err.is_backend_failure()
                        && self.options.on_backend_error == ErrorPolicy::Skip =>
                {
                    tracing::warn!(
                        key,
                        backend = backend.name(),
                        error = %err,
                        "Backend failed during resolution, skipping to next"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(None)
    }

    /// Bulk view across all backends, merged in priority order: for a key
    /// held by several backends, the earliest wins.
    pub async fn load_all(&self) -> Result<HashMap<String, SecretString>> {
        let mut merged = HashMap::new();

        for backend in &self.backends {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Bulk load cancelled, returning no entries");
                    return Ok(HashMap::new());
                }
                outcome = backend.load_all() => outcome,
            };

            match outcome {
                Ok(entries) => {
                    for (key, value) in entries {
                        merged.entry(key).or_insert(value);
                    }
                }
                Err(err)
                    if err.is_backend_failure()
                        && self.options.on_backend_error == ErrorPolicy::Skip =>
                {
                    tracing::warn!(
                        backend = backend.name(),
                        error = %err,
                        "Backend failed during bulk load, skipping to next"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(merged)
    }

    /// Probe every backend, in order. Never short-circuits.
    pub async fn health_check_all(&self) -> Vec<(String, Result<()>)> {
        let mut results = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            results.push((backend.name().to_string(), backend.health_check().await));
        }
        results
    }
}
