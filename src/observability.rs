//! Structured logging initialization.
//!
//! The crate reports everything through `tracing`: resolution outcomes at
//! debug, skipped backends and walk diagnostics at warn. Secret values
//! never appear in events. Host applications that already install a
//! subscriber can ignore this module entirely.

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{ResolveError, Result};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Filter directive, e.g. `info` or `keyfall=debug`.
    pub log_level: String,

    /// Emit JSON-formatted events instead of human-readable ones.
    pub json_format: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_format: false }
    }
}

/// Install the global tracing subscriber.
///
/// Fails if the filter directive is malformed or a subscriber is already
/// installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| ResolveError::config(format!("invalid log filter '{}': {}", config.log_level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| ResolveError::config(format!("failed to install tracing subscriber: {}", e)))
}
