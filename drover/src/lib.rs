// Drover Worker Pool
//
// This crate provides a bounded pool of isolated execution units behind a
// FIFO task queue. Units are created lazily through a `UnitFactory`, reused
// across tasks, evicted by task count, age or idleness, and replaced when
// they crash. The execution-unit contract lives in `drover-api`.

pub mod logging;
pub mod pool;

// Re-export commonly used types
pub use drover_api::{
    failure_channel, unit_factory, unit_interface, ExecutionUnit, FailureReporter, FailureSignal,
    PoolError, PoolResult, RemoteCall, RemoteError, SharedRemoteCall, Submitter, TaskId, UnitFactory,
    UnitFailure, UnitId, Value,
};
pub use pool::{
    EvictionReason, PoolBuilder, PoolConfig, PoolStats, StatsObserver, TaskHandle, WorkerPool, DEFAULT_EVICTION_GRACE,
};
