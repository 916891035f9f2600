use std::time::Duration;

use drover::{PoolConfig, PoolError};
use serde_json::json;

use test_helpers::{echo, mock_pool, sleep_args, wait_until, SETTLE};

#[tokio::test]
async fn test_terminate_all_twice() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(2));
    pool.call("echo", echo("x")).await.unwrap();

    pool.terminate_all();
    pool.terminate_all();

    assert_eq!(pool.stats().live_units, 0);
    assert_eq!(probe.terminated(), 1);
}

#[tokio::test]
async fn test_terminate_all_on_fresh_pool() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(2));
    pool.terminate_all();
    assert_eq!(pool.stats().live_units, 0);
    assert_eq!(probe.terminated(), 0);
}

#[tokio::test]
async fn test_running_and_queued_tasks_are_abandoned() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(1));

    let running = pool.submit("sleep", sleep_args(500, "never")).unwrap();
    let queued = pool.submit("echo", echo("never")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    pool.terminate_all();

    assert!(matches!(running.await, Err(PoolError::Abandoned)));
    assert!(matches!(queued.await, Err(PoolError::Abandoned)));
    assert_eq!(probe.terminated(), 1);
    assert!(wait_until(SETTLE, || probe.running() == 0).await);
    assert!(probe.dispatched().is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_idle_timers() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(1).idle_timeout(Duration::from_millis(30)));
    pool.call("echo", echo("x")).await.unwrap();

    pool.terminate_all();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(probe.terminated(), 1);
}

#[tokio::test]
async fn test_pool_is_usable_after_shutdown() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(1));
    pool.call("echo", echo("before")).await.unwrap();
    pool.terminate_all();

    assert_eq!(pool.call("echo", echo("after")).await.unwrap(), json!("after"));
    assert_eq!(probe.created(), 2);
    assert_eq!(pool.stats().units_created, 2);
    assert_eq!(pool.stats().live_units, 1);
}

#[tokio::test]
async fn test_dropping_last_handle_terminates_units() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(2));
    let clone = pool.clone();
    pool.call("echo", echo("x")).await.unwrap();

    drop(pool);
    assert_eq!(probe.terminated(), 0);

    // Reuses the idle unit
    let pending = clone.submit("sleep", sleep_args(500, "never")).unwrap();
    drop(clone);

    assert!(matches!(pending.await, Err(PoolError::Abandoned)));
    assert_eq!(probe.created(), 1);
    assert_eq!(probe.terminated(), 1);
}
