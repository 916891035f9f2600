//! # Drover API
//!
//! The contract between the Drover worker pool and the execution units it
//! schedules work onto. An execution unit is an isolated worker (a process, a
//! thread, a sandbox) that is only reachable through an asynchronous
//! remote-call interface. The pool never looks inside a unit: it creates one
//! through a [`UnitFactory`], wraps it into a [`RemoteCall`] surface, listens
//! to its [`FailureSignal`], and terminates it explicitly when done.
//!
//! ## Core Components
//!
//! - [`ExecutionUnit`]: the raw unit handle, owning its failure signal and its
//!   termination
//! - [`RemoteCall`]: the method-call surface produced by wrapping a unit
//! - [`UnitFactory`]: creates units and wraps them; [`FnFactory`] adapts a
//!   pair of closures
//! - [`Submitter`]: anything that accepts `(method, args)` submissions and
//!   yields an eventual result; the target of [`unit_interface`] proxies
//! - [`errors`]: caller-facing error types
//!
//! ## Usage Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use drover_api::{failure_channel, unit_factory, ExecutionUnit, FailureReporter,
//!                  FailureSignal, RemoteCall, RemoteError, Value};
//!
//! struct Inline { signal: FailureSignal, _reporter: FailureReporter }
//!
//! impl ExecutionUnit for Inline {
//!     fn failure_signal(&self) -> FailureSignal { self.signal.clone() }
//!     fn terminate(&self) {}
//! }
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl RemoteCall for Echo {
//!     async fn call(&self, _method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
//!         Ok(args.into_iter().next().unwrap_or(Value::Null))
//!     }
//! }
//!
//! let factory = unit_factory(
//!     || {
//!         let (reporter, signal) = failure_channel();
//!         Ok(Inline { signal, _reporter: reporter })
//!     },
//!     |_unit: &Inline| Arc::new(Echo) as Arc<dyn RemoteCall>,
//! );
//! # let _ = factory;
//! ```

pub mod errors;
pub mod signal;
pub mod submit;
pub mod types;
pub mod unit;

pub use errors::{PoolError, PoolResult, RemoteError, UnitFailure};
pub use signal::{failure_channel, FailureReporter, FailureSignal};
pub use submit::Submitter;
pub use types::{BoxedFuture, SharedRemoteCall, TaskId, UnitId, Value};
pub use unit::{unit_factory, ExecutionUnit, FnFactory, RemoteCall, UnitFactory};

// Generated proxies refer to serde_json through this crate.
pub use serde_json;

pub use drover_derive::unit_interface;
