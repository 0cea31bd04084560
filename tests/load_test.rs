//! Load testing for the request router.

use std::sync::Arc;
use std::time::{Duration, Instant};

use verification_gateway::config::RateLimitSettings;
use verification_gateway::providers::types::CostTier;
use verification_gateway::routing::FailureReason;

mod common;

use common::{request, router_with, test_config, ScriptedProvider, Step};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_performance() {
    // 1. Setup providers and a router with room for every request
    let mut config = test_config();
    config.rate_limit.defaults = RateLimitSettings {
        max_tokens: 10_000.0,
        tokens_per_second: 10_000.0,
    };
    let primary = ScriptedProvider::core("primary", CostTier::Low, 0.99, vec![Step::Succeed]);
    let backup = ScriptedProvider::core("backup", CostTier::Medium, 0.95, vec![Step::Succeed]);
    let router = Arc::new(router_with(&config, vec![primary.clone(), backup.clone()]));

    // 2. Run load
    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let start = Instant::now();
    let mut tasks = Vec::new();
    for task_id in 0..concurrency {
        let router = router.clone();
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for i in 0..requests_per_task {
                let entity = format!("entity-{}-{}", task_id, i);
                let req_start = Instant::now();
                let result = router.route_request(request(&entity, "tenant-load")).await;
                if result.success {
                    latencies.push(req_start.elapsed());
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");
    assert_eq!(primary.calls() as usize, total_requests);
    assert_eq!(backup.calls(), 0);

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p95 = all_latencies[(all_latencies.len() as f64 * 0.95) as usize];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P95 Latency:    {:?}", p95);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_one_bucket() {
    let mut config = test_config();
    config.rate_limit.defaults = RateLimitSettings {
        max_tokens: 5.0,
        tokens_per_second: 0.001,
    };
    let provider = ScriptedProvider::core(
        "only",
        CostTier::Low,
        0.99,
        vec![Step::Hang(Duration::from_millis(50))],
    );
    let router = Arc::new(router_with(&config, vec![provider.clone()]));

    let mut tasks = Vec::new();
    for i in 0..20 {
        let router = router.clone();
        tasks.push(tokio::spawn(async move {
            router.route_request(request(&format!("entity-{}", i), "tenant-1")).await
        }));
    }

    let mut admitted = 0;
    let mut limited = 0;
    for task in tasks {
        let result = task.await.unwrap();
        if result.success {
            admitted += 1;
        } else {
            assert_eq!(result.failure_reason(), Some(FailureReason::AllRateLimited));
            limited += 1;
        }
    }

    assert_eq!(admitted, 5);
    assert_eq!(limited, 15);
    assert_eq!(provider.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_bucket_refills_between_bursts() {
    let mut config = test_config();
    config.rate_limit.defaults = RateLimitSettings {
        max_tokens: 3.0,
        tokens_per_second: 1.0,
    };
    let provider = ScriptedProvider::core("only", CostTier::Low, 0.99, vec![Step::Succeed]);
    let router = router_with(&config, vec![provider.clone()]);

    let burst: Vec<_> = (0..5).map(|i| request(&format!("first-{}", i), "tenant-1")).collect();
    let results = router.route_batch(burst, true).await;
    assert_eq!(results.iter().filter(|r| r.success).count(), 3);

    tokio::time::advance(Duration::from_secs(2)).await;

    let burst: Vec<_> = (0..5).map(|i| request(&format!("second-{}", i), "tenant-1")).collect();
    let results = router.route_batch(burst, false).await;
    assert_eq!(results.iter().filter(|r| r.success).count(), 2);
    assert_eq!(provider.calls(), 5);
}
