//! Startup, config reload and shutdown of a full gateway.

mod common;

use std::time::Duration;

use verification_gateway::config::GatewayConfig;
use verification_gateway::providers::types::CostTier;
use verification_gateway::Gateway;

use common::{request, ScriptedProvider, Step};

fn config_with_snapshot(path: &std::path::Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.cache.persistence_path = Some(path.to_string_lossy().into_owned());
    config.health_check.interval_secs = 1;
    config
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("cache.json");

    let first = ScriptedProvider::core("a", CostTier::Low, 0.99, vec![Step::Succeed]);
    let gateway = Gateway::start(config_with_snapshot(&snapshot), vec![first.clone()])
        .await
        .unwrap();
    let result = gateway.router().route_request(request("entity-1", "tenant-1")).await;
    assert!(result.success);
    assert!(!result.cache_hit);
    gateway.shutdown().await.unwrap();
    assert!(snapshot.exists());

    let second = ScriptedProvider::core("a", CostTier::Low, 0.99, vec![Step::Succeed]);
    let gateway = Gateway::start(config_with_snapshot(&snapshot), vec![second.clone()])
        .await
        .unwrap();
    let result = gateway.router().route_request(request("entity-1", "tenant-2")).await;
    assert!(result.cache_hit);
    assert_eq!(second.calls(), 0);
    gateway.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_provider_rejected_at_startup() {
    let a = ScriptedProvider::core("a", CostTier::Low, 0.99, vec![Step::Succeed]);
    let again = ScriptedProvider::core("a", CostTier::High, 0.5, vec![Step::Succeed]);
    let err = Gateway::start(GatewayConfig::default(), vec![a, again])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("provider registration failed"));
}

#[tokio::test]
async fn test_config_file_change_updates_router() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.toml");
    std::fs::write(&path, "[router]\nmax_retries = 3\n").unwrap();

    let mut config = GatewayConfig::default();
    config.health_check.enabled = false;
    let mut gateway = Gateway::start(config, Vec::new()).await.unwrap();
    gateway.watch_config(&path).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(&path, "[router]\nmax_retries = 7\naccept_stale = true\n").unwrap();

    let mut applied = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if gateway.router().config().max_retries == 7 {
            applied = true;
            break;
        }
    }
    assert!(applied, "router config was not reloaded");
    assert!(gateway.router().config().accept_stale);

    gateway.shutdown().await.unwrap();
}
