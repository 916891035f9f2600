use std::time::Duration;

use drover_api::{PoolError, PoolResult};

/// Default grace period between a limit-triggered eviction and the unit's destruction.
pub const DEFAULT_EVICTION_GRACE: Duration = Duration::from_millis(10);

/// Configuration for a `WorkerPool`. Immutable once the pool is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on live execution units.
    pub max_units: usize,

    /// How many tasks a single unit may run at once.
    pub max_concurrent_per_unit: usize,

    /// Destroy a unit after it sat idle this long.
    pub idle_timeout: Option<Duration>,

    /// Evict a unit once it completed this many tasks.
    pub max_tasks_per_unit: Option<u64>,

    /// Evict a unit once it is this old and has no running tasks.
    pub max_unit_lifetime: Option<Duration>,

    /// Delay between marking a unit for eviction and destroying it, letting
    /// the triggering call settle on the unit's side.
    pub eviction_grace: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_units: num_cpus::get(),
            max_concurrent_per_unit: 1,
            idle_timeout: None,
            max_tasks_per_unit: None,
            max_unit_lifetime: None,
            eviction_grace: DEFAULT_EVICTION_GRACE,
        }
    }
}

impl PoolConfig {
    /// A default configuration with the given unit ceiling.
    pub fn with_max_units(max_units: usize) -> Self {
        Self {
            max_units,
            ..Default::default()
        }
    }

    pub fn max_concurrent_per_unit(mut self, max: usize) -> Self {
        self.max_concurrent_per_unit = max;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn max_tasks_per_unit(mut self, max: u64) -> Self {
        self.max_tasks_per_unit = Some(max);
        self
    }

    pub fn max_unit_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_unit_lifetime = Some(lifetime);
        self
    }

    pub fn eviction_grace(mut self, grace: Duration) -> Self {
        self.eviction_grace = grace;
        self
    }

    /// Rejects configurations the pool cannot honour.
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_units < 1 {
            return Err(PoolError::InvalidConfig(format!(
                "max_units must be at least 1, got {}",
                self.max_units
            )));
        }
        if self.max_concurrent_per_unit < 1 {
            return Err(PoolError::InvalidConfig(format!(
                "max_concurrent_per_unit must be at least 1, got {}",
                self.max_concurrent_per_unit
            )));
        }
        if self.max_tasks_per_unit == Some(0) {
            return Err(PoolError::InvalidConfig(
                "max_tasks_per_unit must be at least 1 when set".to_string(),
            ));
        }
        if self.eviction_grace.is_zero() {
            return Err(PoolError::InvalidConfig(
                "eviction_grace must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
