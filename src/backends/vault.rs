//! HashiCorp Vault backends over the KV v2 secrets engine.
//!
//! Two adapters share one connection shape ([`VaultSettings`]):
//!
//! - [`VaultPointBackend`] resolves individual keys directly. A flat key
//!   `db:password` round-trips losslessly to the store path `db/password`,
//!   and the secret's `value` field holds the payload.
//! - [`VaultTreeBackend`] flattens a whole KV subtree into colon-delimited
//!   keys via [`TreeWalker`], building one snapshot per process on first
//!   use. Rotation is out of scope; the snapshot is never invalidated.
//!
//! Every network call is bounded by the configured per-call timeout. An
//! HTTP 404 from the store means "not here" and surfaces as a clean miss,
//! never as an error.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

use super::backend::{BackendKind, SecretBackend};
use crate::error::{ResolveError, Result};
use crate::flatten::{FlattenedTree, TreeSource, TreeWalker, WalkStage, FLAT_DELIMITER};
use crate::types::SecretString;

/// Connection parameters for one Vault backend.
#[derive(Debug, Clone)]
pub struct VaultSettings {
    /// Display name used in diagnostics.
    pub name: String,
    /// Vault server address, e.g. `https://vault.example.com:8200`.
    pub endpoint: String,
    /// Authentication token.
    pub token: SecretString,
    /// KV v2 mount path.
    pub mount_path: String,
    /// Budget for each network call.
    pub request_timeout: Duration,
}

impl VaultSettings {
    /// Read settings from the conventional environment variables.
    ///
    /// Returns `None` unless both `VAULT_ADDR` and `VAULT_TOKEN` are set;
    /// `VAULT_MOUNT_PATH` defaults to `secret`.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("VAULT_ADDR").ok()?;
        let token = std::env::var("VAULT_TOKEN").ok()?;
        let mount_path =
            std::env::var("VAULT_MOUNT_PATH").unwrap_or_else(|_| "secret".to_string());
        Some(Self {
            name: "vault".to_string(),
            endpoint,
            token: SecretString::new(token),
            mount_path,
            request_timeout: Duration::from_secs(10),
        })
    }

    fn build_client(&self) -> Result<VaultClient> {
        let mut builder = VaultClientSettingsBuilder::default();
        builder.address(&self.endpoint);
        builder.token(self.token.expose_secret());

        let settings = builder.build().map_err(|e| {
            ResolveError::config(format!("invalid Vault settings for '{}': {}", self.name, e))
        })?;

        VaultClient::new(settings).map_err(|e| {
            ResolveError::config(format!("failed to create Vault client for '{}': {}", self.name, e))
        })
    }
}

/// Map a vaultrs error to the resolution taxonomy. 404 is handled at call
/// sites, where absence has a meaning.
fn map_client_error(backend: &str, context: &str, err: ClientError) -> ResolveError {
    match err {
        ClientError::APIError { code: code @ (401 | 403), errors } => ResolveError::auth_failed(
            backend,
            format!("{}: status {}: {}", context, code, errors.join("; ")),
        ),
        ClientError::APIError { code, errors } => ResolveError::unavailable(
            backend,
            format!("{}: status {}: {}", context, code, errors.join("; ")),
        ),
        other => ResolveError::unavailable(backend, format!("{}: {}", context, other)),
    }
}

/// Render a leaf field value. Strings pass through; other JSON scalars keep
/// their canonical rendering so no field silently disappears.
fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn key_to_store_path(key: &str) -> String {
    key.replace(FLAT_DELIMITER, "/")
}

/// Point-lookup backend over Vault KV v2.
pub struct VaultPointBackend {
    name: String,
    client: VaultClient,
    mount_path: String,
    request_timeout: Duration,
}

impl fmt::Debug for VaultPointBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultPointBackend")
            .field("name", &self.name)
            .field("mount_path", &self.mount_path)
            .field("client", &"[VaultClient]")
            .finish()
    }
}

impl VaultPointBackend {
    pub fn new(settings: VaultSettings) -> Result<Self> {
        let client = settings.build_client()?;
        tracing::info!(
            backend = %settings.name,
            endpoint = %settings.endpoint,
            mount_path = %settings.mount_path,
            "Initialized Vault point-lookup backend"
        );
        Ok(Self {
            name: settings.name,
            client,
            mount_path: settings.mount_path,
            request_timeout: settings.request_timeout,
        })
    }
}

#[async_trait]
impl SecretBackend for VaultPointBackend {
    async fn try_get(&self, key: &str) -> Result<Option<SecretString>> {
        let path = key_to_store_path(key);
        let read =
            kv2::read::<HashMap<String, serde_json::Value>>(&self.client, &self.mount_path, &path);

        let data = match timeout(self.request_timeout, read).await {
            Err(_) => return Err(ResolveError::timeout(&self.name, self.request_timeout)),
            Ok(Err(ClientError::APIError { code: 404, .. })) => return Ok(None),
            Ok(Err(err)) => {
                return Err(map_client_error(&self.name, &format!("reading '{}'", path), err))
            }
            Ok(Ok(data)) => data,
        };

        let value = data.get("value").ok_or_else(|| {
            ResolveError::malformed(&path, "point-lookup secret has no 'value' field")
        })?;
        Ok(Some(SecretString::new(render_value(value))))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::PointLookup
    }

    async fn health_check(&self) -> Result<()> {
        match timeout(self.request_timeout, vaultrs::sys::health(&self.client)).await {
            Err(_) => Err(ResolveError::timeout(&self.name, self.request_timeout)),
            Ok(Err(err)) => Err(map_client_error(&self.name, "health check", err)),
            Ok(Ok(_)) => Ok(()),
        }
    }
}

/// Tree backend over Vault KV v2, flattened once per process.
pub struct VaultTreeBackend {
    name: String,
    client: VaultClient,
    mount_path: String,
    request_timeout: Duration,
    walker: TreeWalker,
    snapshot: OnceCell<FlattenedTree>,
}

impl fmt::Debug for VaultTreeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultTreeBackend")
            .field("name", &self.name)
            .field("mount_path", &self.mount_path)
            .field("snapshot_built", &self.snapshot.initialized())
            .field("client", &"[VaultClient]")
            .finish()
    }
}

impl VaultTreeBackend {
    pub fn new(settings: VaultSettings, max_depth: usize) -> Result<Self> {
        let client = settings.build_client()?;
        tracing::info!(
            backend = %settings.name,
            endpoint = %settings.endpoint,
            mount_path = %settings.mount_path,
            "Initialized Vault tree backend"
        );
        Ok(Self {
            name: settings.name,
            client,
            mount_path: settings.mount_path,
            request_timeout: settings.request_timeout,
            walker: TreeWalker::new(max_depth),
            snapshot: OnceCell::new(),
        })
    }

    /// Flattened snapshot, built on first use.
    ///
    /// A failure to list the root means the backend as a whole is
    /// unreachable: that surfaces as an error and nothing is cached, so a
    /// later call can try again. Failures below the root degrade to
    /// diagnostics and the snapshot is kept.
    async fn snapshot(&self) -> Result<&FlattenedTree> {
        self.snapshot
            .get_or_try_init(|| async {
                let tree = self.walker.flatten(self).await;

                if let Some(diag) = tree
                    .diagnostics()
                    .iter()
                    .find(|d| d.path.is_empty() && d.stage == WalkStage::List)
                {
                    return Err(ResolveError::unavailable(
                        &self.name,
                        format!("root listing failed: {}", diag.message),
                    ));
                }

                for diag in tree.diagnostics() {
                    tracing::warn!(
                        backend = %self.name,
                        path = %diag.path,
                        stage = %diag.stage,
                        "Subtree skipped while flattening: {}",
                        diag.message
                    );
                }
                tracing::info!(
                    backend = %self.name,
                    entries = tree.len(),
                    skipped_subtrees = tree.diagnostics().len(),
                    "Built flattened snapshot"
                );
                Ok(tree)
            })
            .await
    }
}

#[async_trait]
impl TreeSource for VaultTreeBackend {
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let list = kv2::list(&self.client, &self.mount_path, path);
        match timeout(self.request_timeout, list).await {
            Err(_) => Err(ResolveError::timeout(&self.name, self.request_timeout)),
            // An empty subtree lists as 404.
            Ok(Err(ClientError::APIError { code: 404, .. })) => Ok(Vec::new()),
            Ok(Err(err)) => Err(map_client_error(&self.name, &format!("listing '{}'", path), err)),
            Ok(Ok(names)) => Ok(names),
        }
    }

    async fn read(&self, path: &str) -> Result<HashMap<String, String>> {
        let read =
            kv2::read::<HashMap<String, serde_json::Value>>(&self.client, &self.mount_path, path);
        match timeout(self.request_timeout, read).await {
            Err(_) => Err(ResolveError::timeout(&self.name, self.request_timeout)),
            // A leaf deleted between list and read is simply absent.
            Ok(Err(ClientError::APIError { code: 404, .. })) => Ok(HashMap::new()),
            Ok(Err(err)) => Err(map_client_error(&self.name, &format!("reading '{}'", path), err)),
            Ok(Ok(data)) => {
                Ok(data.into_iter().map(|(field, value)| (field, render_value(&value))).collect())
            }
        }
    }
}

#[async_trait]
impl SecretBackend for VaultTreeBackend {
    async fn try_get(&self, key: &str) -> Result<Option<SecretString>> {
        Ok(self.snapshot().await?.get(key).cloned())
    }

    async fn load_all(&self) -> Result<HashMap<String, SecretString>> {
        Ok(self.snapshot().await?.entries().clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Tree
    }

    async fn health_check(&self) -> Result<()> {
        match timeout(self.request_timeout, vaultrs::sys::health(&self.client)).await {
            Err(_) => Err(ResolveError::timeout(&self.name, self.request_timeout)),
            Ok(Err(err)) => Err(map_client_error(&self.name, "health check", err)),
            Ok(Ok(_)) => Ok(()),
        }
    }
}
