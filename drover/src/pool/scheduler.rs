//! Admission and dispatch.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use drover_api::{ExecutionUnit, PoolError, PoolResult, RemoteError, TaskId, UnitFactory, UnitId, Value};
use futures::FutureExt;
use tracing::{debug, trace, warn};

use super::queue::{PendingTask, TaskHandle};
use super::registry::{InFlight, UnitRecord};
use super::stats::PoolStats;
use super::{PoolInner, PoolState};

impl<F: UnitFactory> PoolInner<F> {
    pub(super) fn submit(self: &Arc<Self>, method: String, args: Vec<Value>) -> PoolResult<TaskHandle> {
        if method.trim().is_empty() {
            return Err(PoolError::InvalidArgument("method name must not be empty".to_string()));
        }

        let mut updates = Vec::new();
        let handle = {
            let mut state = self.lock_state();
            let handle = state.queue.enqueue(method, args);
            crate::log_scheduler!(
                "task_queued",
                task_id = handle.id(),
                queue_depth = state.queue.len()
            );
            self.record_stats(&state, &mut updates);
            self.schedule(&mut state, &mut updates);
            handle
        };
        self.publish(updates);
        Ok(handle)
    }

    /// Dispatches queued tasks until the queue is empty or no unit can take
    /// the head task.
    ///
    /// Existing units are tried first, in slot order; a new unit is created
    /// only when none of them has room and the pool is below `max_units`.
    pub(super) fn schedule(self: &Arc<Self>, state: &mut PoolState<F::Unit>, updates: &mut Vec<PoolStats>) {
        while !state.queue.is_empty() {
            let unit_id = match state.registry.first_accepting(self.config.max_concurrent_per_unit) {
                Some(unit_id) => unit_id,
                None if state.registry.len() < self.config.max_units => match self.spawn_unit(state) {
                    Ok(record) => {
                        let unit_id = record.id;
                        state.registry.insert(record);
                        crate::log_unit!(unit_id, "created", live_units = state.registry.len());
                        unit_id
                    }
                    Err(error) => {
                        // The head task would wait forever on a factory that keeps failing.
                        warn!(%error, "failed to create execution unit, rejecting head task");
                        if let Some(task) = state.queue.pop() {
                            task.reject(error);
                        }
                        self.record_stats(state, updates);
                        continue;
                    }
                },
                None => break,
            };

            let Some(task) = state.queue.pop() else {
                break;
            };
            if let Err(task) = self.dispatch(state, unit_id, task) {
                state.queue.requeue(task);
                break;
            }
            self.record_stats(state, updates);
        }

        if !state.queue.is_empty() {
            trace!(
                queue_depth = state.queue.len(),
                live_units = state.registry.len(),
                "pool saturated, tasks waiting"
            );
        }
    }

    /// Creates a unit through the factory and starts watching its failure signal.
    pub(super) fn spawn_unit(self: &Arc<Self>, state: &mut PoolState<F::Unit>) -> PoolResult<UnitRecord<F::Unit>> {
        let unit = self
            .factory
            .create_unit()
            .map_err(|error| PoolError::UnitCreation(format!("{error:#}")))?;
        let call = self.factory.wrap(&unit);
        let unit_id = state.registry.allocate_id();
        let signal = unit.failure_signal();

        let mut record = UnitRecord::new(unit_id, unit, call);
        record.set_crash_watch(self.watch_failures(unit_id, signal));
        Ok(record)
    }

    /// Starts `task` on unit `unit_id`. Hands the task back if the unit is gone.
    fn dispatch(
        self: &Arc<Self>,
        state: &mut PoolState<F::Unit>,
        unit_id: UnitId,
        task: PendingTask,
    ) -> Result<(), PendingTask> {
        if state.registry.get(unit_id).is_none() {
            return Err(task);
        }
        state.registry.clear_idle(unit_id);
        state.idle_timers.cancel(unit_id);

        let Some(record) = state.registry.get_mut(unit_id) else {
            return Err(task);
        };
        let PendingTask {
            id: task_id,
            method,
            args,
            reply,
        } = task;

        debug!(
            task_id,
            unit_id,
            method = %method,
            running = record.running_tasks() + 1,
            "dispatching task"
        );

        let call = Arc::clone(&record.call);
        let pool = Arc::downgrade(self);
        let call_task = self.runtime.spawn(async move {
            // A panic settles the task like any other remote failure.
            let outcome = AssertUnwindSafe(call.call(&method, args))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    warn!(task_id, unit_id, %message, "remote call panicked");
                    Err(RemoteError::Failed(format!("remote call panicked: {message}")))
                });
            if let Some(pool) = pool.upgrade() {
                pool.complete(unit_id, task_id, outcome);
            }
        });
        record.start_task(
            task_id,
            InFlight {
                reply,
                call_task: call_task.abort_handle(),
            },
        );
        Ok(())
    }

    /// Settles a finished remote call and lets the unit's lifecycle react.
    ///
    /// Completions for units or tasks the pool no longer tracks are dropped:
    /// the task was already settled by a crash or abandoned by shutdown.
    fn complete(self: &Arc<Self>, unit_id: UnitId, task_id: TaskId, outcome: Result<Value, RemoteError>) {
        let mut updates = Vec::new();
        {
            let mut state = self.lock_state();
            let Some(record) = state.registry.get_mut(unit_id) else {
                return;
            };
            let Some(flight) = record.finish_task(task_id) else {
                return;
            };
            let drained = record.running_tasks() == 0;

            match &outcome {
                Ok(_) => debug!(task_id, unit_id, "task completed"),
                Err(error) => debug!(task_id, unit_id, %error, "task failed"),
            }
            let _ = flight.reply.send(outcome.map_err(PoolError::from));

            if drained {
                self.settle_unit(&mut state, unit_id);
            }
            self.record_stats(&state, &mut updates);
            self.schedule(&mut state, &mut updates);
        }
        self.publish(updates);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
