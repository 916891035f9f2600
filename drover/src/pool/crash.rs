//! Unit failure handling.

use std::sync::Arc;

use drover_api::{FailureSignal, PoolError, UnitFactory, UnitFailure, UnitId};
use tokio::task::AbortHandle;
use tracing::{error, warn};

use super::PoolInner;

impl<F: UnitFactory> PoolInner<F> {
    /// Spawns the task that waits for unit `unit_id` to fail.
    pub(super) fn watch_failures(self: &Arc<Self>, unit_id: UnitId, signal: FailureSignal) -> AbortHandle {
        let pool = Arc::downgrade(self);
        self.runtime
            .spawn(async move {
                let failure = signal.recv().await;
                if let Some(pool) = pool.upgrade() {
                    pool.handle_crash(unit_id, failure);
                }
            })
            .abort_handle()
    }

    /// Replaces a failed unit in its slot and rejects the tasks it was running.
    ///
    /// A unit already marked for termination is removed without replacement.
    /// If the factory cannot build a replacement the slot is dropped; later
    /// scheduling passes create units on demand.
    fn handle_crash(self: &Arc<Self>, unit_id: UnitId, failure: UnitFailure) {
        let mut updates = Vec::new();
        {
            let mut state = self.lock_state();
            let Some(record) = state.registry.get(unit_id) else {
                return;
            };
            let was_evicting = record.marked_for_termination;
            warn!(unit_id, %failure, running = record.running_tasks(), "execution unit crashed");

            state.registry.clear_idle(unit_id);
            state.idle_timers.cancel(unit_id);

            let crashed = if was_evicting {
                state.registry.remove(unit_id)
            } else {
                match self.spawn_unit(&mut state) {
                    Ok(replacement) => {
                        let replacement_id = replacement.id;
                        let crashed = state.registry.replace(unit_id, replacement);
                        state.registry.mark_idle(replacement_id);
                        self.arm_idle_timer(&mut state, replacement_id);
                        crate::log_unit!(replacement_id, "replaced", crashed_unit = unit_id);
                        crashed
                    }
                    Err(error) => {
                        error!(unit_id, %error, "failed to replace crashed execution unit");
                        state.registry.remove(unit_id)
                    }
                }
            };

            if let Some(mut crashed) = crashed {
                crashed.reject_in_flight(|| PoolError::UnitCrashed {
                    unit_id,
                    reason: failure.clone(),
                });
                crashed.destroy();
            }

            self.record_stats(&state, &mut updates);
            self.schedule(&mut state, &mut updates);
        }
        self.publish(updates);
    }
}
