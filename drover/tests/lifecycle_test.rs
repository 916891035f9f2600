use std::time::Duration;

use drover::PoolConfig;
use serde_json::json;

use test_helpers::{echo, mock_pool, sleep_args, wait_until, SETTLE};

#[tokio::test]
async fn test_task_limit_recycles_unit() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(1).max_tasks_per_unit(2));

    pool.call("echo", echo("a")).await.unwrap();
    pool.call("echo", echo("b")).await.unwrap();

    // Marked at once, destroyed after the grace period
    assert_eq!(pool.stats().units_accepting_work, 0);
    assert!(wait_until(SETTLE, || probe.terminated() == 1).await);
    assert_eq!(pool.stats().live_units, 0);

    assert_eq!(pool.call("echo", echo("c")).await.unwrap(), json!("c"));
    assert_eq!(probe.created(), 2);
    assert_eq!(pool.stats().live_units, 1);
}

#[tokio::test]
async fn test_task_waits_for_marked_unit_to_go() {
    let (pool, probe) = mock_pool(
        PoolConfig::with_max_units(1)
            .max_tasks_per_unit(1)
            .eviction_grace(Duration::from_millis(100)),
    );

    pool.call("echo", echo("first")).await.unwrap();

    let waiting = pool.submit("echo", echo("second")).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.live_units, 1);
    assert_eq!(stats.units_accepting_work, 0);
    assert_eq!(stats.available_capacity, 0);
    assert_eq!(stats.queue_depth, 1);

    assert_eq!(waiting.await.unwrap(), json!("second"));
    assert_eq!(probe.created(), 2);
    assert_eq!(probe.terminated(), 1);
}

#[tokio::test]
async fn test_idle_timeout_destroys_unit() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(2).idle_timeout(Duration::from_millis(100)));

    pool.call("echo", echo("x")).await.unwrap();
    assert_eq!(pool.stats().idle_units, 1);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let stats = pool.stats();
    assert_eq!(stats.live_units, 0);
    assert_eq!(stats.idle_units, 0);
    assert_eq!(probe.terminated(), 1);
}

#[tokio::test]
async fn test_reuse_cancels_idle_timer() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(1).idle_timeout(Duration::from_millis(200)));

    pool.call("echo", echo("1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    pool.call("echo", echo("2")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    // 240ms since the first completion, but only 120ms since the second
    assert_eq!(pool.stats().live_units, 1);
    assert_eq!(probe.terminated(), 0);

    assert!(wait_until(SETTLE, || probe.terminated() == 1).await);
    assert_eq!(pool.stats().live_units, 0);
    assert_eq!(probe.created(), 1);
}

#[tokio::test]
async fn test_lifetime_limit_checked_after_completion() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(1).max_unit_lifetime(Duration::from_millis(50)));

    pool.call("echo", echo("young")).await.unwrap();
    assert_eq!(probe.terminated(), 0);

    tokio::time::sleep(Duration::from_millis(80)).await;
    // Still alive until a completion triggers the check
    assert_eq!(pool.stats().live_units, 1);

    pool.call("echo", echo("old")).await.unwrap();
    assert!(wait_until(SETTLE, || probe.terminated() == 1).await);

    pool.call("echo", echo("fresh")).await.unwrap();
    assert_eq!(probe.created(), 2);
}

#[tokio::test]
async fn test_busy_unit_is_not_evicted() {
    let (pool, probe) = mock_pool(
        PoolConfig::with_max_units(1)
            .max_concurrent_per_unit(2)
            .max_tasks_per_unit(1),
    );

    let short = pool.call("sleep", sleep_args(20, "short"));
    let long = pool.call("sleep", sleep_args(150, "long"));

    assert_eq!(short.await.unwrap(), json!("short"));
    tokio::time::sleep(Duration::from_millis(40)).await;
    // Over its task limit but still running the long task
    assert_eq!(probe.terminated(), 0);
    assert_eq!(pool.stats().running_task_total, 1);

    assert_eq!(long.await.unwrap(), json!("long"));
    assert!(wait_until(SETTLE, || probe.terminated() == 1).await);
}

#[tokio::test]
async fn test_no_limits_keeps_units_alive() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(1));

    for _ in 0..3 {
        pool.call("echo", echo("again")).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = pool.stats();
    assert_eq!(stats.live_units, 1);
    assert_eq!(stats.idle_units, 1);
    assert_eq!(probe.terminated(), 0);
}
