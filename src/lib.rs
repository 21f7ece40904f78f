//! # Keyfall
//!
//! Keyfall resolves application configuration secrets across an ordered
//! chain of backends. A flat, colon-delimited key (`db:password`) is tried
//! against each backend in priority order until one holds it; hierarchical
//! stores are flattened into the same namespace, so a Vault KV tree leaf at
//! `app/db` with field `password` answers for `app:db:password`.
//!
//! ## Architecture
//!
//! ```text
//! host configuration  →  SecretProvider (memoizing facade)
//!                              ↓
//!                        CompositeResolver (ordered fallback)
//!                              ↓
//!        [ VaultPointBackend | VaultTreeBackend | EnvBackend ] …
//!                              ↓
//!                  TreeWalker flattens hierarchical stores
//! ```
//!
//! Absence is a value, not an error: a key no backend holds resolves to
//! `None` and the host's own configuration defaults apply. Backend
//! *failures* are policy-controlled: skipped with a warning by default,
//! or fatal under [`ErrorPolicy::Abort`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use keyfall::{BackendConfig, ResolverConfig, ResolverOptions, SecretProvider};
//!
//! let config = ResolverConfig {
//!     backends: vec![
//!         BackendConfig::PointLookup {
//!             name: Some("primary".into()),
//!             endpoint: "https://vault-a.example.com:8200".into(),
//!             token: "tok-a".into(),
//!             mount_path: "secret".into(),
//!         },
//!         BackendConfig::Tree {
//!             name: Some("shared".into()),
//!             endpoint: "https://vault-b.example.com:8200".into(),
//!             token: "tok-b".into(),
//!             mount_path: "kv".into(),
//!         },
//!     ],
//!     options: ResolverOptions::default(),
//! };
//!
//! let provider = SecretProvider::from_config(&config)?;
//!
//! // Tries vault-a first, then the flattened vault-b tree.
//! if let Some(password) = provider.get("db:password").await? {
//!     connect(password.expose_secret());
//! }
//! ```
//!
//! ## Security
//!
//! Resolved values and tokens live in [`SecretString`]: redacted in Debug,
//! Display, and serialization, zeroed on drop. Nothing in this crate logs a
//! secret value.

pub mod backends;
pub mod config;
pub mod error;
pub mod flatten;
pub mod observability;
pub mod provider;
pub mod resolver;
pub mod types;

// Re-export main types
pub use backends::{
    build_backends, BackendKind, EnvBackend, SecretBackend, VaultPointBackend, VaultSettings,
    VaultTreeBackend,
};
pub use config::{BackendConfig, ErrorPolicy, ResolverConfig, ResolverOptions};
pub use error::{ResolveError, Result};
pub use flatten::{FlattenedTree, TreeSource, TreeWalker, WalkDiagnostic, WalkStage};
pub use observability::{init_tracing, ObservabilityConfig};
pub use provider::SecretProvider;
pub use resolver::CompositeResolver;
pub use types::SecretString;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
