use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use drover_api::{ExecutionUnit, PoolError, SharedRemoteCall, TaskId, UnitId};
use tokio::task::AbortHandle;

use super::queue::ReplySender;

/// A task dispatched to a unit whose remote call has not settled.
#[derive(Debug)]
pub(crate) struct InFlight {
    pub reply: ReplySender,
    pub call_task: AbortHandle,
}

/// Registry entry for one live execution unit.
pub(crate) struct UnitRecord<U> {
    pub id: UnitId,
    pub unit: U,
    pub call: SharedRemoteCall,
    pub created_at: Instant,
    pub completed_tasks: u64,
    pub marked_for_termination: bool,
    in_flight: HashMap<TaskId, InFlight>,
    crash_watch: Option<AbortHandle>,
}

impl<U: ExecutionUnit> UnitRecord<U> {
    pub fn new(id: UnitId, unit: U, call: SharedRemoteCall) -> Self {
        Self {
            id,
            unit,
            call,
            created_at: Instant::now(),
            completed_tasks: 0,
            marked_for_termination: false,
            in_flight: HashMap::new(),
            crash_watch: None,
        }
    }

    pub fn set_crash_watch(&mut self, watch: AbortHandle) {
        self.crash_watch = Some(watch);
    }

    pub fn running_tasks(&self) -> usize {
        self.in_flight.len()
    }

    pub fn accepts_work(&self, max_concurrent: usize) -> bool {
        !self.marked_for_termination && self.running_tasks() < max_concurrent
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn start_task(&mut self, task_id: TaskId, flight: InFlight) {
        self.in_flight.insert(task_id, flight);
    }

    /// Removes a settled task, counting it as completed.
    pub fn finish_task(&mut self, task_id: TaskId) -> Option<InFlight> {
        let flight = self.in_flight.remove(&task_id)?;
        self.completed_tasks += 1;
        Some(flight)
    }

    /// Rejects every in-flight task with `error` and stops their calls.
    pub fn reject_in_flight(&mut self, mut error: impl FnMut() -> PoolError) {
        for (_, flight) in self.in_flight.drain() {
            flight.call_task.abort();
            let _ = flight.reply.send(Err(error()));
        }
    }

    /// Releases the unit. In-flight calls are stopped and their handles dropped.
    pub fn destroy(mut self) {
        if let Some(watch) = self.crash_watch.take() {
            watch.abort();
        }
        for (_, flight) in self.in_flight.drain() {
            flight.call_task.abort();
        }
        self.unit.terminate();
    }
}

/// Authoritative list of live units plus the idle subset.
pub(crate) struct UnitRegistry<U> {
    units: Vec<UnitRecord<U>>,
    idle: BTreeSet<UnitId>,
    next_id: UnitId,
    created_total: u64,
}

impl<U> Default for UnitRegistry<U> {
    fn default() -> Self {
        Self {
            units: Vec::new(),
            idle: BTreeSet::new(),
            next_id: 1,
            created_total: 0,
        }
    }
}

impl<U: ExecutionUnit> UnitRegistry<U> {
    /// Reserves the identity for a unit about to be created.
    pub fn allocate_id(&mut self) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, record: UnitRecord<U>) {
        self.created_total += 1;
        self.units.push(record);
    }

    /// Puts `record` into the slot of unit `id`, returning the previous occupant.
    pub fn replace(&mut self, id: UnitId, record: UnitRecord<U>) -> Option<UnitRecord<U>> {
        let slot = self.position(id)?;
        self.idle.remove(&id);
        self.created_total += 1;
        Some(std::mem::replace(&mut self.units[slot], record))
    }

    pub fn remove(&mut self, id: UnitId) -> Option<UnitRecord<U>> {
        let slot = self.position(id)?;
        self.idle.remove(&id);
        Some(self.units.remove(slot))
    }

    /// Empties the registry, returning every record.
    pub fn drain(&mut self) -> Vec<UnitRecord<U>> {
        self.idle.clear();
        self.units.drain(..).collect()
    }

    pub fn get(&self, id: UnitId) -> Option<&UnitRecord<U>> {
        self.units.iter().find(|record| record.id == id)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut UnitRecord<U>> {
        self.units.iter_mut().find(|record| record.id == id)
    }

    fn position(&self, id: UnitId) -> Option<usize> {
        self.units.iter().position(|record| record.id == id)
    }

    /// First unit, in slot order, that can take another task.
    pub fn first_accepting(&self, max_concurrent: usize) -> Option<UnitId> {
        self.units
            .iter()
            .find(|record| record.accepts_work(max_concurrent))
            .map(|record| record.id)
    }

    pub fn mark_idle(&mut self, id: UnitId) {
        self.idle.insert(id);
    }

    /// Drops `id` from the idle set, returning whether it was there.
    pub fn clear_idle(&mut self, id: UnitId) -> bool {
        self.idle.remove(&id)
    }

    pub fn is_idle(&self, id: UnitId) -> bool {
        self.idle.contains(&id)
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitRecord<U>> {
        self.units.iter()
    }

    pub fn created_total(&self) -> u64 {
        self.created_total
    }
}
