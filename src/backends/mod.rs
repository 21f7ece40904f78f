//! Backend adapters and construction from configuration records.

pub mod backend;
pub mod env;
pub mod vault;

pub use backend::{BackendKind, SecretBackend};
pub use env::{EnvBackend, DEFAULT_ENV_PREFIX};
pub use vault::{VaultPointBackend, VaultSettings, VaultTreeBackend};

use std::sync::Arc;

use crate::config::{BackendConfig, ResolverOptions};
use crate::error::Result;

/// Build the ordered adapter list from configuration records.
///
/// Records are validated first; any malformed endpoint or empty required
/// field is fatal here, before any client is constructed. Order is
/// preserved: the first record has the highest priority.
pub fn build_backends(
    configs: &[BackendConfig],
    options: &ResolverOptions,
) -> Result<Vec<Arc<dyn SecretBackend>>> {
    for config in configs {
        config.validate()?;
    }

    let mut backends: Vec<Arc<dyn SecretBackend>> = Vec::with_capacity(configs.len());
    for (index, config) in configs.iter().enumerate() {
        let backend: Arc<dyn SecretBackend> = match config {
            BackendConfig::PointLookup { name, endpoint, token, mount_path } => {
                let settings = VaultSettings {
                    name: name.clone().unwrap_or_else(|| format!("point_lookup#{}", index)),
                    endpoint: endpoint.clone(),
                    token: token.clone(),
                    mount_path: mount_path.clone(),
                    request_timeout: options.call_timeout(),
                };
                Arc::new(VaultPointBackend::new(settings)?)
            }
            BackendConfig::Tree { name, endpoint, token, mount_path } => {
                let settings = VaultSettings {
                    name: name.clone().unwrap_or_else(|| format!("tree#{}", index)),
                    endpoint: endpoint.clone(),
                    token: token.clone(),
                    mount_path: mount_path.clone(),
                    request_timeout: options.call_timeout(),
                };
                Arc::new(VaultTreeBackend::new(settings, options.max_depth)?)
            }
            BackendConfig::Env { prefix } => Arc::new(EnvBackend::new(prefix.clone())),
        };
        backends.push(backend);
    }

    Ok(backends)
}
