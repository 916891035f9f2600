//! # Pool Error Types
//!
//! Errors surfaced by the worker pool and its execution units.
//!
//! Three layers are kept apart:
//! - [`RemoteError`]: a remote call rejected. Produced by [`RemoteCall`]
//!   implementations and handed to the caller unchanged.
//! - [`UnitFailure`]: an execution unit died. Produced by the unit's failure
//!   signal and turned into [`PoolError::UnitCrashed`] for every task that was
//!   in flight on it.
//! - [`PoolError`]: everything a caller of the pool can observe.
//!
//! ## Usage Example
//!
//! ```rust
//! use drover_api::errors::{PoolError, RemoteError};
//!
//! fn describe(error: &PoolError) -> &'static str {
//!     match error {
//!         PoolError::Remote(RemoteError::MethodNotFound(_)) => "unknown method",
//!         PoolError::Remote(_) => "task failed",
//!         PoolError::UnitCrashed { .. } => "unit crashed, safe to retry",
//!         _ => "pool error",
//!     }
//! }
//! # let _ = describe;
//! ```
//!
//! [`RemoteCall`]: crate::unit::RemoteCall

use crate::types::UnitId;
use thiserror::Error;

/// Failure reported by a remote call.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The unit does not expose the requested method.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// The remote method ran and rejected.
    #[error("Remote call failed: {0}")]
    Failed(String),

    /// Transport or encoding failure on the way to or from the unit.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reason an execution unit stopped without being asked to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitFailure {
    /// The unit terminated abnormally, with the exit code if one is known.
    #[error("unit exited abnormally (code: {0:?})")]
    Exited(Option<i32>),

    /// The unit's channel closed unexpectedly.
    #[error("unit closed unexpectedly")]
    Closed,

    /// The unit reported an error and can no longer serve calls.
    #[error("unit error: {0}")]
    Error(String),
}

/// Core error type for pool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool configuration was rejected at construction.
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// A submission was rejected before it reached the queue.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The remote call rejected; carries the original failure.
    #[error("Task failed: {0}")]
    Remote(#[from] RemoteError),

    /// The unit running the task crashed before the call settled.
    #[error("Execution unit {unit_id} crashed: {reason}")]
    UnitCrashed { unit_id: UnitId, reason: UnitFailure },

    /// No unit could be created to run the task.
    #[error("Failed to create execution unit: {0}")]
    UnitCreation(String),

    /// The pool was shut down before the task settled.
    #[error("Task abandoned by pool shutdown")]
    Abandoned,

    /// The result could not be decoded into the expected type.
    #[error("Failed to decode result: {0}")]
    Decode(String),

    /// The pool was built outside a tokio runtime.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

impl PoolError {
    /// Whether the failure came from the unit going away rather than from the task itself.
    pub fn is_crash(&self) -> bool {
        matches!(self, PoolError::UnitCrashed { .. })
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
