//! Environment variable backend.
//!
//! A read-only point-lookup backend over process environment variables,
//! intended for development and tests. Not a secure store: variables are
//! visible in process listings and carry no access control.
//!
//! A flat key maps to a variable name by prefixing, uppercasing, and
//! replacing the configuration delimiter with `__` (colons cannot appear in
//! portable variable names): `db:password` → `KEYFALL_SECRET_DB__PASSWORD`.

use std::collections::HashMap;
use std::env;

use async_trait::async_trait;

use super::backend::{BackendKind, SecretBackend};
use crate::error::Result;
use crate::flatten::FLAT_DELIMITER;
use crate::types::SecretString;

/// Default variable name prefix.
pub const DEFAULT_ENV_PREFIX: &str = "KEYFALL_SECRET_";

/// Environment variable point-lookup backend (development only).
#[derive(Debug, Clone)]
pub struct EnvBackend {
    name: String,
    prefix: String,
}

impl EnvBackend {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { name: "env".to_string(), prefix: prefix.into() }
    }

    /// Convert a flat configuration key to the variable name.
    fn key_to_var(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_uppercase().replace(FLAT_DELIMITER, "__"))
    }

    /// Convert a prefixed variable name back to a flat configuration key.
    fn var_to_key(&self, var: &str) -> Option<String> {
        var.strip_prefix(&self.prefix)
            .map(|rest| rest.to_lowercase().replace("__", &FLAT_DELIMITER.to_string()))
    }
}

impl Default for EnvBackend {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

#[async_trait]
impl SecretBackend for EnvBackend {
    async fn try_get(&self, key: &str) -> Result<Option<SecretString>> {
        Ok(env::var(self.key_to_var(key)).ok().map(SecretString::new))
    }

    async fn load_all(&self) -> Result<HashMap<String, SecretString>> {
        Ok(env::vars()
            .filter_map(|(var, value)| {
                self.var_to_key(&var).map(|key| (key, SecretString::new(value)))
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Env
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_to_var_mapping() {
        let backend = EnvBackend::default();
        assert_eq!(backend.key_to_var("db:password"), "KEYFALL_SECRET_DB__PASSWORD");
        assert_eq!(backend.key_to_var("api_key"), "KEYFALL_SECRET_API_KEY");
    }

    #[test]
    fn test_var_to_key_mapping() {
        let backend = EnvBackend::default();
        assert_eq!(
            backend.var_to_key("KEYFALL_SECRET_DB__PASSWORD"),
            Some("db:password".to_string())
        );
        assert_eq!(backend.var_to_key("UNRELATED_VAR"), None);
    }

    #[tokio::test]
    async fn test_try_get_found_and_absent() {
        env::set_var("KEYFALL_SECRET_ENV__HIT", "from-env");
        let backend = EnvBackend::default();

        let hit = backend.try_get("env:hit").await.unwrap();
        assert_eq!(hit.map(|v| v.into_inner()), Some("from-env".to_string()));

        let miss = backend.try_get("env:definitely_missing").await.unwrap();
        assert!(miss.is_none());

        env::remove_var("KEYFALL_SECRET_ENV__HIT");
    }

    #[tokio::test]
    async fn test_load_all_scans_prefix() {
        env::set_var("KEYFALL_SECRET_SCAN__ONE", "1");
        env::set_var("KEYFALL_SECRET_SCAN__TWO", "2");
        env::set_var("SOME_OTHER_VAR", "x");

        let all = EnvBackend::default().load_all().await.unwrap();
        assert_eq!(all.get("scan:one").map(|v| v.expose_secret()), Some("1"));
        assert_eq!(all.get("scan:two").map(|v| v.expose_secret()), Some("2"));
        assert!(!all.contains_key("some_other_var"));

        env::remove_var("KEYFALL_SECRET_SCAN__ONE");
        env::remove_var("KEYFALL_SECRET_SCAN__TWO");
        env::remove_var("SOME_OTHER_VAR");
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        env::set_var("APP_SECRET_TOKEN", "t");
        let backend = EnvBackend::new("APP_SECRET_");
        let hit = backend.try_get("token").await.unwrap();
        assert!(hit.is_some());
        env::remove_var("APP_SECRET_TOKEN");
    }
}
