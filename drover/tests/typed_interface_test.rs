use drover::{unit_interface, PoolConfig, PoolError, RemoteError};

use test_helpers::mock_pool;

#[unit_interface]
trait MockWorker {
    fn echo(&self, value: String) -> String;

    #[call(method = "sleep")]
    fn delayed(&self, millis: u64, value: u32) -> u32;

    fn fail(&self, reason: String);

    #[call(method = "echo")]
    fn echo_as_number(&self, value: String) -> u64;
}

#[tokio::test]
async fn test_typed_call_round_trips_through_pool() {
    let (pool, probe) = mock_pool(PoolConfig::with_max_units(1));

    assert_eq!(pool.echo("typed".to_string()).await.unwrap(), "typed");
    assert_eq!(pool.delayed(10, 42).await.unwrap(), 42);
    assert_eq!(probe.created(), 1);
}

#[tokio::test]
async fn test_typed_call_propagates_remote_failure() {
    let (pool, _probe) = mock_pool(PoolConfig::with_max_units(1));

    let err = pool.fail("nope".to_string()).await.unwrap_err();
    assert!(matches!(err, PoolError::Remote(RemoteError::Failed(ref msg)) if msg == "nope"));
}

#[tokio::test]
async fn test_result_decode_failure() {
    let (pool, _probe) = mock_pool(PoolConfig::with_max_units(1));

    let err = pool.echo_as_number("not a number".to_string()).await.unwrap_err();
    assert!(matches!(err, PoolError::Decode(_)));
}

#[tokio::test]
async fn test_typed_calls_submit_eagerly() {
    let (pool, _probe) = mock_pool(PoolConfig::with_max_units(1));

    let first = pool.delayed(30, 1);
    let second = pool.delayed(30, 2);
    assert_eq!(pool.stats().running_task_total, 1);
    assert_eq!(pool.stats().queue_depth, 1);

    assert_eq!(first.await.unwrap(), 1);
    assert_eq!(second.await.unwrap(), 2);
}
