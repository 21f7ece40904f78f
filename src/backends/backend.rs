//! Secret backend trait and types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::SecretString;

/// Kind of secret backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Resolves individual keys directly, without exposing hierarchy.
    PointLookup,
    /// Hierarchical store flattened into colon-delimited keys.
    Tree,
    /// Environment variables (development fallback).
    Env,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointLookup => "point_lookup",
            Self::Tree => "tree",
            Self::Env => "env",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "point_lookup" => Ok(Self::PointLookup),
            "tree" => Ok(Self::Tree),
            "env" => Ok(Self::Env),
            _ => Err(format!("Unknown backend kind: {}", s)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One secret store consulted during resolution.
///
/// Implementations are stateless after construction apart from read-only
/// snapshots; each call may perform network I/O. A "not found" condition in
/// the underlying store MUST surface as `Ok(None)`, never as an error:
/// callers distinguish "this backend doesn't hold the key" from "this
/// backend is broken" by a plain branch, not by error inspection.
#[async_trait]
pub trait SecretBackend: Send + Sync + fmt::Debug {
    /// Resolve one flat configuration key.
    ///
    /// # Errors
    ///
    /// Anything other than a clean hit or a clean miss: unreachable store,
    /// failed authentication, malformed payload, exceeded call budget.
    async fn try_get(&self, key: &str) -> Result<Option<SecretString>>;

    /// Bulk view of everything this backend can enumerate, keyed by flat
    /// configuration key. Point-lookup stores cannot enumerate and return
    /// an empty map.
    async fn load_all(&self) -> Result<HashMap<String, SecretString>> {
        Ok(HashMap::new())
    }

    /// Display name used in diagnostics.
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    /// Probe whether the backend is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
