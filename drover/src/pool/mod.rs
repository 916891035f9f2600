//! # Worker Pool
//!
//! The coordinator that owns the task queue and the execution-unit registry.
//!
//! ## Key Concepts
//! - Lazy units: no unit exists before the first task needs one, and never
//!   more than `max_units`
//! - First-fit admission: the head task goes to the first unit below its
//!   concurrency ceiling, else to a newly created unit, else it waits
//! - Lifecycle limits: units are evicted after `max_tasks_per_unit` tasks,
//!   after `max_unit_lifetime`, or after sitting idle for `idle_timeout`, but
//!   never while they run a task
//! - Crash replacement: a unit that fails is swapped for a fresh one in the
//!   same slot; its in-flight tasks are rejected, not retried
//!
//! ## Concurrency Model
//! All queue and registry mutation happens synchronously under one lock, in
//! response to discrete events: a submission, a completed call, a fired idle
//! timer, a failure signal. Remote calls, timers and failure watches run as
//! tokio tasks and re-enter the coordinator when they finish. The stats
//! observer is called after the lock is released.
//!
//! ## Example
//!
//! ```rust,ignore
//! let pool = WorkerPool::builder(factory)
//!     .max_units(4)
//!     .idle_timeout(Duration::from_secs(30))
//!     .on_stats_update(|stats| tracing::debug!(?stats, "pool changed"))
//!     .build()?;
//!
//! let thumbnail = pool.call("resize", vec![json!("cat.png"), json!(128)]).await?;
//! pool.terminate_all();
//! ```

mod config;
mod crash;
mod lifecycle;
mod queue;
mod registry;
mod scheduler;
mod stats;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use drover_api::{BoxedFuture, ExecutionUnit, PoolError, PoolResult, Submitter, UnitFactory, Value};
use tokio::runtime::Handle;

pub use config::{PoolConfig, DEFAULT_EVICTION_GRACE};
pub use lifecycle::EvictionReason;
pub use queue::TaskHandle;
pub use stats::{PoolStats, StatsObserver};

use lifecycle::IdleTimers;
use queue::TaskQueue;
use registry::UnitRegistry;

/// A bounded pool of execution units with a FIFO task queue.
///
/// Cloning is cheap and yields another handle to the same pool. When the last
/// handle is dropped every unit is terminated and outstanding tasks resolve
/// with [`PoolError::Abandoned`].
pub struct WorkerPool<F: UnitFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: UnitFactory> WorkerPool<F> {
    /// Builds a pool on the current tokio runtime.
    pub fn new(factory: F, config: PoolConfig) -> PoolResult<Self> {
        Self::builder(factory).config(config).build()
    }

    pub fn builder(factory: F) -> PoolBuilder<F> {
        PoolBuilder {
            factory,
            config: PoolConfig::default(),
            observer: None,
            runtime: None,
        }
    }

    /// Queues `method(args)` and runs a scheduling pass.
    ///
    /// The task is queued before this returns, whether or not the handle is
    /// ever polled. Fails only if `method` is empty.
    pub fn submit(&self, method: impl Into<String>, args: Vec<Value>) -> PoolResult<TaskHandle> {
        self.inner.submit(method.into(), args)
    }

    /// Submits `method(args)` and returns its eventual result.
    pub fn call(&self, method: impl Into<String>, args: Vec<Value>) -> BoxedFuture<'static, PoolResult<Value>> {
        let submitted = self.submit(method, args);
        Box::pin(async move { submitted?.await })
    }

    /// Current occupancy, computed from live state.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock_state();
        state.snapshot(&self.inner.config)
    }

    /// Destroys every unit, cancels idle timers and drops the queue.
    ///
    /// Queued and in-flight tasks are abandoned: their handles resolve with
    /// [`PoolError::Abandoned`], never with a result. Calling it again is a
    /// no-op. The pool stays usable; later submissions create units anew.
    pub fn terminate_all(&self) {
        self.inner.terminate_all();
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl<F: UnitFactory> Clone for WorkerPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: UnitFactory> Submitter for WorkerPool<F> {
    fn submit_call(&self, method: &str, args: Vec<Value>) -> BoxedFuture<'static, PoolResult<Value>> {
        self.call(method, args)
    }
}

impl<F: UnitFactory> fmt::Debug for WorkerPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("WorkerPool")
            .field("config", &self.inner.config)
            .field("stats", &state.snapshot(&self.inner.config))
            .field("armed_idle_timers", &state.idle_timers.len())
            .finish()
    }
}

/// Builder for [`WorkerPool`].
pub struct PoolBuilder<F> {
    factory: F,
    config: PoolConfig,
    observer: Option<StatsObserver>,
    runtime: Option<Handle>,
}

impl<F: UnitFactory> PoolBuilder<F> {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_units(mut self, max_units: usize) -> Self {
        self.config.max_units = max_units;
        self
    }

    pub fn max_concurrent_per_unit(mut self, max: usize) -> Self {
        self.config.max_concurrent_per_unit = max;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = Some(timeout);
        self
    }

    pub fn max_tasks_per_unit(mut self, max: u64) -> Self {
        self.config.max_tasks_per_unit = Some(max);
        self
    }

    pub fn max_unit_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.max_unit_lifetime = Some(lifetime);
        self
    }

    pub fn eviction_grace(mut self, grace: Duration) -> Self {
        self.config.eviction_grace = grace;
        self
    }

    /// Observer called with a fresh snapshot after every mutating event.
    pub fn on_stats_update<O>(mut self, observer: O) -> Self
    where
        O: Fn(&PoolStats) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Runtime that runs remote calls, timers and failure watches.
    /// Defaults to the runtime `build` is called from.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> PoolResult<WorkerPool<F>> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|error| PoolError::NoRuntime(error.to_string()))?,
        };

        crate::log_pool!(
            "build",
            "completed",
            max_units = self.config.max_units,
            max_concurrent_per_unit = self.config.max_concurrent_per_unit
        );

        Ok(WorkerPool {
            inner: Arc::new(PoolInner {
                config: self.config,
                factory: self.factory,
                runtime,
                observer: self.observer,
                state: Mutex::new(PoolState {
                    queue: TaskQueue::default(),
                    registry: UnitRegistry::default(),
                    idle_timers: IdleTimers::default(),
                }),
            }),
        })
    }
}

/// Shared core behind every [`WorkerPool`] handle.
struct PoolInner<F: UnitFactory> {
    config: PoolConfig,
    factory: F,
    runtime: Handle,
    observer: Option<StatsObserver>,
    state: Mutex<PoolState<F::Unit>>,
}

/// Everything the coordinator mutates.
struct PoolState<U> {
    queue: TaskQueue,
    registry: UnitRegistry<U>,
    idle_timers: IdleTimers,
}

impl<U: ExecutionUnit> PoolState<U> {
    fn snapshot(&self, config: &PoolConfig) -> PoolStats {
        let live_units = self.registry.len();
        let units_accepting_work = self
            .registry
            .iter()
            .filter(|record| record.accepts_work(config.max_concurrent_per_unit))
            .count();
        let running_task_total = self.registry.iter().map(|record| record.running_tasks()).sum();

        PoolStats {
            configured_size: config.max_units,
            available_capacity: units_accepting_work + config.max_units.saturating_sub(live_units),
            queue_depth: self.queue.len(),
            live_units,
            idle_units: self.registry.idle_count(),
            running_task_total,
            units_accepting_work,
            units_created: self.registry.created_total(),
        }
    }
}

impl<F: UnitFactory> PoolInner<F> {
    fn lock_state(&self) -> MutexGuard<'_, PoolState<F::Unit>> {
        // A panicking observer never holds the lock; recover rather than wedge the pool.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a snapshot for the observer, if there is one.
    fn record_stats(&self, state: &PoolState<F::Unit>, updates: &mut Vec<PoolStats>) {
        if self.observer.is_some() {
            updates.push(state.snapshot(&self.config));
        }
    }

    /// Delivers queued snapshots. Must be called without the state lock held.
    fn publish(&self, updates: Vec<PoolStats>) {
        if let Some(observer) = &self.observer {
            for stats in &updates {
                observer(stats);
            }
        }
    }

    fn terminate_all(&self) {
        let mut updates = Vec::new();
        {
            let mut state = self.lock_state();
            state.idle_timers.clear();
            let abandoned = state.queue.drain();
            let units = state.registry.drain();

            if !units.is_empty() || !abandoned.is_empty() {
                crate::log_pool!(
                    "terminate_all",
                    "completed",
                    units = units.len(),
                    abandoned_tasks = abandoned.len()
                );
            }
            for record in units {
                record.destroy();
            }
            drop(abandoned);
            self.record_stats(&state, &mut updates);
        }
        self.publish(updates);
    }
}

impl<F: UnitFactory> Drop for PoolInner<F> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.idle_timers.clear();
        drop(state.queue.drain());
        for record in state.registry.drain() {
            record.destroy();
        }
    }
}
