//! Configuration records for resolver construction.
//!
//! An ordered sequence of [`BackendConfig`] records plus a set of
//! [`ResolverOptions`] fully determines a
//! [`CompositeResolver`](crate::resolver::CompositeResolver) instance.
//! Validation happens once, at construction time; a malformed endpoint or
//! an empty required field is fatal there and nowhere else.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ResolveError, Result};
use crate::types::SecretString;

fn default_mount_path() -> String {
    "secret".to_string()
}

fn default_env_prefix() -> String {
    "KEYFALL_SECRET_".to_string()
}

fn default_call_timeout_seconds() -> u64 {
    10
}

fn default_max_depth() -> usize {
    32
}

/// One backend in the resolution chain. Order in the containing list is
/// priority order.
///
/// Credentials are opaque: they are checked for non-emptiness and passed
/// through, never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// A store resolving individual keys directly, without hierarchy.
    PointLookup {
        /// Display name used in diagnostics. Defaults to `point_lookup#<index>`.
        #[serde(default)]
        name: Option<String>,
        /// Store address, e.g. `https://vault.example.com:8200`.
        endpoint: String,
        /// Authentication token.
        token: SecretString,
        /// KV v2 mount path.
        #[serde(default = "default_mount_path")]
        mount_path: String,
    },

    /// A hierarchical store flattened into colon-delimited keys.
    Tree {
        #[serde(default)]
        name: Option<String>,
        endpoint: String,
        token: SecretString,
        #[serde(default = "default_mount_path")]
        mount_path: String,
    },

    /// Environment variables (development fallback).
    Env {
        /// Variable name prefix, e.g. `KEYFALL_SECRET_`.
        #[serde(default = "default_env_prefix")]
        prefix: String,
    },
}

impl BackendConfig {
    /// Validate this record. Called once during resolver construction.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::PointLookup { endpoint, token, mount_path, .. }
            | Self::Tree { endpoint, token, mount_path, .. } => {
                if endpoint.is_empty() {
                    return Err(ResolveError::config("backend endpoint cannot be empty"));
                }
                Url::parse(endpoint).map_err(|e| {
                    ResolveError::config(format!("malformed backend endpoint '{}': {}", endpoint, e))
                })?;
                if token.is_empty() {
                    return Err(ResolveError::config(format!(
                        "backend '{}' has an empty token",
                        endpoint
                    )));
                }
                if mount_path.is_empty() {
                    return Err(ResolveError::config(format!(
                        "backend '{}' has an empty mount path",
                        endpoint
                    )));
                }
                Ok(())
            }
            Self::Env { prefix } => {
                if prefix.is_empty() {
                    return Err(ResolveError::config("env backend prefix cannot be empty"));
                }
                Ok(())
            }
        }
    }
}

/// What to do when a backend fails (as opposed to merely not holding a key)
/// during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Log a warning and consult the next backend. Preserves availability
    /// over strictness.
    #[default]
    Skip,
    /// Abort the whole resolution with the backend's error.
    Abort,
}

/// Resolver-wide options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverOptions {
    /// Policy for backend failures during resolution.
    #[serde(default)]
    pub on_backend_error: ErrorPolicy,

    /// Budget for each individual backend network call, in seconds.
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: u64,

    /// Maximum recursion depth when flattening a tree backend.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            on_backend_error: ErrorPolicy::default(),
            call_timeout_seconds: default_call_timeout_seconds(),
            max_depth: default_max_depth(),
        }
    }
}

impl ResolverOptions {
    /// Per-call budget as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    /// Validate option values.
    pub fn validate(&self) -> Result<()> {
        if self.call_timeout_seconds == 0 {
            return Err(ResolveError::config("call timeout must be at least one second"));
        }
        if self.max_depth == 0 {
            return Err(ResolveError::config("max depth must be at least 1"));
        }
        Ok(())
    }
}

/// Complete configuration for one resolver instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Ordered backend list, highest priority first.
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub options: ResolverOptions,
}

impl ResolverConfig {
    /// Validate every backend record and the options.
    pub fn validate(&self) -> Result<()> {
        self.options.validate()?;
        for backend in &self.backends {
            backend.validate()?;
        }
        Ok(())
    }
}
