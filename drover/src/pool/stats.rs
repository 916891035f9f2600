use std::sync::Arc;

use serde::Serialize;

/// Point-in-time occupancy of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    /// Configured unit ceiling.
    pub configured_size: usize,

    /// Units able to take another task plus unused unit-creation headroom.
    pub available_capacity: usize,

    /// Tasks waiting for a unit.
    pub queue_depth: usize,

    /// Units currently registered, including those marked for termination.
    pub live_units: usize,

    /// Units with no running tasks that are not marked for termination.
    pub idle_units: usize,

    /// Tasks running across all units.
    pub running_task_total: usize,

    /// Units below their concurrency ceiling and not marked for termination.
    pub units_accepting_work: usize,

    /// Units created over the pool's lifetime, replacements included.
    pub units_created: u64,
}

impl PoolStats {
    /// Whether the pool has no queued or running work.
    pub fn is_quiescent(&self) -> bool {
        self.queue_depth == 0 && self.running_task_total == 0
    }
}

/// Observer invoked after every mutating pool event.
pub type StatsObserver = Arc<dyn Fn(&PoolStats) + Send + Sync>;
