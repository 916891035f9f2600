//! Eviction policy and idle timers.
//!
//! After every completion that leaves a unit with no running tasks the pool
//! asks [`disposition`] what to do with it. Limit-triggered evictions mark the
//! unit at once and destroy it after the configured grace period; idle units
//! get a timer that is cancelled as soon as they are reused.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use drover_api::{ExecutionUnit, UnitFactory, UnitId};
use tokio::task::AbortHandle;

use super::config::PoolConfig;
use super::registry::UnitRecord;
use super::{PoolInner, PoolState};

/// Why a unit is being evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    TaskLimit,
    Lifetime,
    IdleTimeout,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            EvictionReason::TaskLimit => "task_limit",
            EvictionReason::Lifetime => "lifetime",
            EvictionReason::IdleTimeout => "idle_timeout",
        };
        f.write_str(reason)
    }
}

/// What to do with a unit after a task completed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Still running tasks; decide again when it drains.
    Busy,
    /// Mark for termination and destroy.
    Evict(EvictionReason),
    /// Keep around, idle.
    Idle,
}

pub(crate) fn disposition<U: ExecutionUnit>(
    record: &UnitRecord<U>,
    config: &PoolConfig,
    now: Instant,
) -> Disposition {
    if record.running_tasks() > 0 {
        return Disposition::Busy;
    }
    if let Some(max_tasks) = config.max_tasks_per_unit {
        if record.completed_tasks >= max_tasks {
            return Disposition::Evict(EvictionReason::TaskLimit);
        }
    }
    if let Some(lifetime) = config.max_unit_lifetime {
        if record.age(now) >= lifetime {
            return Disposition::Evict(EvictionReason::Lifetime);
        }
    }
    Disposition::Idle
}

struct IdleTimer {
    token: u64,
    task: AbortHandle,
}

/// Pending idle timers keyed by unit.
///
/// Each armed timer carries a token. A timer that fires checks its token with
/// [`IdleTimers::take_if_current`], so a timer cancelled after it already woke
/// up cannot evict a unit that was reused in the meantime.
#[derive(Default)]
pub(crate) struct IdleTimers {
    timers: HashMap<UnitId, IdleTimer>,
    next_token: u64,
}

impl IdleTimers {
    pub fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    pub fn arm(&mut self, unit: UnitId, token: u64, task: AbortHandle) {
        if let Some(previous) = self.timers.insert(unit, IdleTimer { token, task }) {
            previous.task.abort();
        }
    }

    /// Cancels the unit's timer, returning whether one was pending.
    pub fn cancel(&mut self, unit: UnitId) -> bool {
        match self.timers.remove(&unit) {
            Some(timer) => {
                timer.task.abort();
                true
            }
            None => false,
        }
    }

    /// Consumes the unit's timer if `token` is still the armed one.
    pub fn take_if_current(&mut self, unit: UnitId, token: u64) -> bool {
        match self.timers.get(&unit) {
            Some(timer) if timer.token == token => {
                self.timers.remove(&unit);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.task.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }
}

impl<F: UnitFactory> PoolInner<F> {
    /// Applies the lifecycle policy to a unit that just ran out of tasks.
    pub(super) fn settle_unit(self: &Arc<Self>, state: &mut PoolState<F::Unit>, unit_id: UnitId) {
        let Some(record) = state.registry.get(unit_id) else {
            return;
        };
        match disposition(record, &self.config, Instant::now()) {
            Disposition::Busy => {}
            Disposition::Evict(reason) => self.begin_eviction(state, unit_id, reason),
            Disposition::Idle => {
                state.registry.mark_idle(unit_id);
                self.arm_idle_timer(state, unit_id);
            }
        }
    }

    /// Marks the unit for termination and destroys it once the grace period ends.
    fn begin_eviction(self: &Arc<Self>, state: &mut PoolState<F::Unit>, unit_id: UnitId, reason: EvictionReason) {
        let Some(record) = state.registry.get_mut(unit_id) else {
            return;
        };
        record.marked_for_termination = true;
        crate::log_unit!(
            unit_id,
            "eviction_scheduled",
            reason = %reason,
            completed_tasks = record.completed_tasks
        );
        state.registry.clear_idle(unit_id);
        state.idle_timers.cancel(unit_id);

        let pool = Arc::downgrade(self);
        let grace = self.config.eviction_grace;
        self.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(pool) = pool.upgrade() {
                pool.finish_eviction(unit_id, reason);
            }
        });
    }

    fn finish_eviction(self: &Arc<Self>, unit_id: UnitId, reason: EvictionReason) {
        let mut updates = Vec::new();
        {
            let mut state = self.lock_state();
            // Gone already if it crashed or the pool was shut down meanwhile.
            match state.registry.get(unit_id) {
                Some(record) if record.marked_for_termination => {}
                _ => return,
            }
            if let Some(record) = state.registry.remove(unit_id) {
                record.destroy();
            }
            crate::log_unit!(unit_id, "evicted", reason = %reason, live_units = state.registry.len());

            self.record_stats(&state, &mut updates);
            self.schedule(&mut state, &mut updates);
        }
        self.publish(updates);
    }

    pub(super) fn arm_idle_timer(self: &Arc<Self>, state: &mut PoolState<F::Unit>, unit_id: UnitId) {
        let Some(timeout) = self.config.idle_timeout else {
            return;
        };
        let token = state.idle_timers.next_token();
        let pool = Arc::downgrade(self);
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(pool) = pool.upgrade() {
                pool.idle_expired(unit_id, token);
            }
        });
        state.idle_timers.arm(unit_id, token, timer.abort_handle());
    }

    fn idle_expired(self: &Arc<Self>, unit_id: UnitId, token: u64) {
        let mut updates = Vec::new();
        {
            let mut state = self.lock_state();
            if !state.idle_timers.take_if_current(unit_id, token) {
                return;
            }
            let still_idle = state.registry.is_idle(unit_id)
                && state
                    .registry
                    .get(unit_id)
                    .is_some_and(|record| record.running_tasks() == 0 && !record.marked_for_termination);
            if !still_idle {
                return;
            }
            if let Some(record) = state.registry.remove(unit_id) {
                record.destroy();
            }
            crate::log_unit!(
                unit_id,
                "evicted",
                reason = %EvictionReason::IdleTimeout,
                live_units = state.registry.len()
            );
            self.record_stats(&state, &mut updates);
        }
        self.publish(updates);
    }
}
