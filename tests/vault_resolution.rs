//! Integration tests driving the Vault backends against a mocked KV v2
//! HTTP API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{any, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use keyfall::{
    BackendConfig, CompositeResolver, ErrorPolicy, ResolveError, ResolverConfig, ResolverOptions,
    SecretBackend, SecretProvider, SecretString, VaultPointBackend, VaultSettings,
    VaultTreeBackend,
};

fn settings(server_uri: &str, name: &str) -> VaultSettings {
    VaultSettings {
        name: name.to_string(),
        endpoint: server_uri.to_string(),
        token: SecretString::new("test-token"),
        mount_path: "secret".to_string(),
        request_timeout: Duration::from_secs(2),
    }
}

/// KV v2 read response: the secret's fields sit under `data.data`.
fn kv2_secret(fields: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "request_id": "2b0c7c92-7f4e-4d32-b5b2-6d6c3e6a2f10",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": {
            "data": fields,
            "metadata": {
                "created_time": "2026-01-05T09:00:00Z",
                "deletion_time": "",
                "destroyed": false,
                "version": 1
            }
        },
        "wrap_info": null,
        "warnings": null,
        "auth": null
    }))
}

/// KV v2 list response: entry names, folders with a trailing slash.
fn kv2_keys(keys: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "request_id": "5f6a9b1e-30a7-41a9-9f2b-9a4a1a7c44d2",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": { "keys": keys },
        "wrap_info": null,
        "warnings": null,
        "auth": null
    }))
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({ "errors": [] }))
}

fn permission_denied() -> ResponseTemplate {
    ResponseTemplate::new(403).set_body_json(json!({ "errors": ["permission denied"] }))
}

async fn mount_catch_all_404(server: &MockServer) {
    Mock::given(any()).respond_with(not_found()).with_priority(250).mount(server).await;
}

#[tokio::test]
async fn test_point_lookup_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/db/password"))
        .respond_with(kv2_secret(json!({ "value": "secretA" })))
        .mount(&server)
        .await;

    let backend = VaultPointBackend::new(settings(&server.uri(), "primary")).unwrap();
    let value = backend.try_get("db:password").await.unwrap();
    assert_eq!(value.map(|v| v.into_inner()), Some("secretA".to_string()));
}

#[tokio::test]
async fn test_point_lookup_404_is_absent_not_error() {
    let server = MockServer::start().await;
    mount_catch_all_404(&server).await;

    let backend = VaultPointBackend::new(settings(&server.uri(), "primary")).unwrap();
    let value = backend.try_get("missing:key").await.unwrap();
    assert!(value.is_none());
}

#[tokio::test]
async fn test_point_lookup_403_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/db/password"))
        .respond_with(permission_denied())
        .mount(&server)
        .await;

    let backend = VaultPointBackend::new(settings(&server.uri(), "primary")).unwrap();
    let err = backend.try_get("db:password").await.unwrap_err();
    assert!(matches!(err, ResolveError::AuthenticationFailed { .. }));
}

#[tokio::test]
async fn test_point_lookup_missing_value_field_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/odd"))
        .respond_with(kv2_secret(json!({ "something_else": "x" })))
        .mount(&server)
        .await;

    let backend = VaultPointBackend::new(settings(&server.uri(), "primary")).unwrap();
    let err = backend.try_get("odd").await.unwrap_err();
    assert!(matches!(err, ResolveError::MalformedSecret { .. }));
}

#[tokio::test]
async fn test_point_lookup_slow_store_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/slow"))
        .respond_with(
            kv2_secret(json!({ "value": "late" })).set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut slow = settings(&server.uri(), "primary");
    slow.request_timeout = Duration::from_millis(100);

    let backend = VaultPointBackend::new(slow).unwrap();
    let err = backend.try_get("slow").await.unwrap_err();
    assert!(matches!(err, ResolveError::Timeout { .. }));
    assert!(err.is_backend_failure());
}

#[tokio::test]
async fn test_tree_backend_flattens_namespace_once() {
    let server = MockServer::start().await;
    Mock::given(method("LIST"))
        .and(path_regex("^/v1/secret/metadata/?$"))
        .respond_with(kv2_keys(&["app/", "shared"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("LIST"))
        .and(path_regex("^/v1/secret/metadata/app/?$"))
        .respond_with(kv2_keys(&["db"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app/db"))
        .respond_with(kv2_secret(json!({ "password": "s3cret", "user": "svc" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/shared"))
        .respond_with(kv2_secret(json!({ "api_key": "k-123" })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = VaultTreeBackend::new(settings(&server.uri(), "tree"), 32).unwrap();

    let value = backend.try_get("app:db:password").await.unwrap();
    assert_eq!(value.map(|v| v.into_inner()), Some("s3cret".to_string()));

    // Served from the snapshot: no further HTTP traffic (the expect(1)
    // bounds above verify on drop).
    let all = backend.load_all().await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all.get("app:db:user").map(|v| v.expose_secret()), Some("svc"));
    assert_eq!(all.get("shared:api_key").map(|v| v.expose_secret()), Some("k-123"));
    assert!(all.keys().all(|k| !k.contains('/')));
}

#[tokio::test]
async fn test_tree_backend_denied_subtree_leaves_siblings_intact() {
    let server = MockServer::start().await;
    Mock::given(method("LIST"))
        .and(path_regex("^/v1/secret/metadata/?$"))
        .respond_with(kv2_keys(&["denied/", "ok"]))
        .mount(&server)
        .await;
    Mock::given(method("LIST"))
        .and(path_regex("^/v1/secret/metadata/denied/?$"))
        .respond_with(permission_denied())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/ok"))
        .respond_with(kv2_secret(json!({ "v": "1" })))
        .mount(&server)
        .await;

    let backend = VaultTreeBackend::new(settings(&server.uri(), "tree"), 32).unwrap();

    let value = backend.try_get("ok:v").await.unwrap();
    assert_eq!(value.map(|v| v.into_inner()), Some("1".to_string()));
    assert!(backend.try_get("denied:anything").await.unwrap().is_none());
}

#[tokio::test]
async fn test_tree_backend_empty_mount_is_empty_not_broken() {
    let server = MockServer::start().await;
    // An unprovisioned mount lists as 404.
    mount_catch_all_404(&server).await;

    let backend = VaultTreeBackend::new(settings(&server.uri(), "tree"), 32).unwrap();
    assert!(backend.try_get("anything").await.unwrap().is_none());
    assert!(backend.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tree_backend_root_denied_is_backend_failure() {
    let server = MockServer::start().await;
    Mock::given(method("LIST"))
        .and(path_regex("^/v1/secret/metadata/?$"))
        .respond_with(permission_denied())
        .mount(&server)
        .await;

    let backend = VaultTreeBackend::new(settings(&server.uri(), "tree"), 32).unwrap();
    let err = backend.try_get("anything").await.unwrap_err();
    assert!(matches!(err, ResolveError::BackendUnavailable { .. }));
}

/// A point-lookup store shadows a tree store for one key, the tree answers
/// for another, and an unknown key is absent everywhere.
#[tokio::test]
async fn test_composite_point_then_tree_fallback() {
    let point_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/db/password"))
        .respond_with(kv2_secret(json!({ "value": "secretA" })))
        .mount(&point_server)
        .await;
    mount_catch_all_404(&point_server).await;

    let tree_server = MockServer::start().await;
    Mock::given(method("LIST"))
        .and(path_regex("^/v1/secret/metadata/?$"))
        .respond_with(kv2_keys(&["db", "api"]))
        .mount(&tree_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/db"))
        .respond_with(kv2_secret(json!({ "password": "secretB" })))
        .mount(&tree_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/api"))
        .respond_with(kv2_secret(json!({ "key": "secretC" })))
        .mount(&tree_server)
        .await;

    let point = VaultPointBackend::new(settings(&point_server.uri(), "primary")).unwrap();
    let tree = VaultTreeBackend::new(settings(&tree_server.uri(), "shared"), 32).unwrap();
    let resolver = CompositeResolver::new(
        vec![Arc::new(point), Arc::new(tree)],
        ResolverOptions::default(),
    );

    let first = resolver.resolve("db:password").await.unwrap();
    assert_eq!(first.map(|v| v.into_inner()), Some("secretA".to_string()));

    let second = resolver.resolve("api:key").await.unwrap();
    assert_eq!(second.map(|v| v.into_inner()), Some("secretC".to_string()));

    assert!(resolver.resolve("missing:key").await.unwrap().is_none());
}

#[tokio::test]
async fn test_skip_policy_falls_through_unreachable_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/k"))
        .respond_with(kv2_secret(json!({ "value": "v" })))
        .mount(&server)
        .await;

    // Nothing listens on port 1: connection refused.
    let mut unreachable = settings("http://127.0.0.1:1", "dead");
    unreachable.request_timeout = Duration::from_millis(500);

    let dead = VaultPointBackend::new(unreachable).unwrap();
    let live = VaultPointBackend::new(settings(&server.uri(), "live")).unwrap();

    let resolver = CompositeResolver::new(
        vec![Arc::new(dead), Arc::new(live)],
        ResolverOptions { on_backend_error: ErrorPolicy::Skip, ..Default::default() },
    );

    let value = resolver.resolve("k").await.unwrap();
    assert_eq!(value.map(|v| v.into_inner()), Some("v".to_string()));
}

#[tokio::test]
async fn test_abort_policy_surfaces_unreachable_backend() {
    let server = MockServer::start().await;
    mount_catch_all_404(&server).await;

    let mut unreachable = settings("http://127.0.0.1:1", "dead");
    unreachable.request_timeout = Duration::from_millis(500);

    let dead = VaultPointBackend::new(unreachable).unwrap();
    let live = VaultPointBackend::new(settings(&server.uri(), "live")).unwrap();

    let resolver = CompositeResolver::new(
        vec![Arc::new(dead), Arc::new(live)],
        ResolverOptions { on_backend_error: ErrorPolicy::Abort, ..Default::default() },
    );

    let err = resolver.resolve("k").await.unwrap_err();
    assert!(err.is_backend_failure());
}

#[tokio::test]
async fn test_provider_resolves_each_key_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/db/password"))
        .respond_with(kv2_secret(json!({ "value": "secretA" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/missing/key"))
        .respond_with(not_found())
        .expect(1)
        .mount(&server)
        .await;

    let backend = VaultPointBackend::new(settings(&server.uri(), "primary")).unwrap();
    let provider = SecretProvider::new(CompositeResolver::new(
        vec![Arc::new(backend)],
        ResolverOptions::default(),
    ));

    for _ in 0..3 {
        let value = provider.get("db:password").await.unwrap();
        assert_eq!(value.map(|v| v.into_inner()), Some("secretA".to_string()));
        assert!(provider.get("missing:key").await.unwrap().is_none());
    }
    assert_eq!(provider.cache_size().await, 2);
    // The expect(1) bounds verify on server drop.
}

#[tokio::test]
async fn test_health_checks_report_per_backend() {
    let healthy_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "initialized": true,
            "sealed": false,
            "standby": false,
            "performance_standby": false,
            "replication_performance_mode": "disabled",
            "replication_dr_mode": "disabled",
            "server_time_utc": 1754400000u64,
            "version": "1.15.0",
            "cluster_name": "vault-cluster-test",
            "cluster_id": "ca1c2b10-5d24-4c83-bb3c-6d6c3e6a2f10"
        })))
        .mount(&healthy_server)
        .await;

    let mut unreachable = settings("http://127.0.0.1:1", "dead");
    unreachable.request_timeout = Duration::from_millis(500);

    let live = VaultPointBackend::new(settings(&healthy_server.uri(), "live")).unwrap();
    let dead = VaultPointBackend::new(unreachable).unwrap();
    let resolver = CompositeResolver::new(
        vec![Arc::new(live), Arc::new(dead)],
        ResolverOptions::default(),
    );

    let results = resolver.health_check_all().await;
    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
}

#[tokio::test]
async fn test_provider_from_config_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/service/token"))
        .respond_with(kv2_secret(json!({ "value": "tok-xyz" })))
        .mount(&server)
        .await;
    mount_catch_all_404(&server).await;

    std::env::set_var("KEYFALL_SECRET_FALLBACK__KEY", "from-env");

    let config = ResolverConfig {
        backends: vec![
            BackendConfig::PointLookup {
                name: Some("primary".to_string()),
                endpoint: server.uri(),
                token: SecretString::new("test-token"),
                mount_path: "secret".to_string(),
            },
            BackendConfig::Env { prefix: "KEYFALL_SECRET_".to_string() },
        ],
        options: ResolverOptions::default(),
    };

    let provider = SecretProvider::from_config(&config).unwrap();

    let value = provider.get("service:token").await.unwrap();
    assert_eq!(value.map(|v| v.into_inner()), Some("tok-xyz".to_string()));

    // Not in Vault, picked up from the env fallback.
    let fallback = provider.get("fallback:key").await.unwrap();
    assert_eq!(fallback.map(|v| v.into_inner()), Some("from-env".to_string()));

    std::env::remove_var("KEYFALL_SECRET_FALLBACK__KEY");
}
