use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::errors::RemoteError;
use crate::signal::FailureSignal;
use crate::types::{SharedRemoteCall, Value};

/// Method-call surface of an execution unit.
///
/// The pool invokes `call(method, args)` and awaits the eventual result. An
/// unknown method should reject with [`RemoteError::MethodNotFound`]; the pool
/// treats it like any other task failure.
#[async_trait]
pub trait RemoteCall: Send + Sync {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError>;
}

/// A raw, isolated execution unit.
pub trait ExecutionUnit: Send + Sync + 'static {
    /// The signal that resolves when this unit dies abnormally.
    ///
    /// The pool subscribes exactly once, right after creation.
    fn failure_signal(&self) -> FailureSignal;

    /// Releases the unit's underlying resource.
    ///
    /// Called exactly once when the pool destroys the unit, including after a
    /// crash. Must not block for long: it runs while the pool's state is held.
    fn terminate(&self);
}

/// Creates execution units and wraps them into callable interfaces.
pub trait UnitFactory: Send + Sync + 'static {
    type Unit: ExecutionUnit;

    /// Instantiates one raw execution unit.
    ///
    /// Must not block for long: it runs while the pool's state is held, as
    /// does [`wrap`](Self::wrap).
    fn create_unit(&self) -> anyhow::Result<Self::Unit>;

    /// Produces the method-call surface for a freshly created unit.
    fn wrap(&self, unit: &Self::Unit) -> SharedRemoteCall;
}

/// [`UnitFactory`] built from a pair of closures.
pub struct FnFactory<U, C, W> {
    create: C,
    wrap: W,
    _unit: PhantomData<fn() -> U>,
}

/// Builds a [`UnitFactory`] from a `create` closure and a `wrap` closure.
pub fn unit_factory<U, C, W>(create: C, wrap: W) -> FnFactory<U, C, W>
where
    U: ExecutionUnit,
    C: Fn() -> anyhow::Result<U> + Send + Sync + 'static,
    W: Fn(&U) -> SharedRemoteCall + Send + Sync + 'static,
{
    FnFactory {
        create,
        wrap,
        _unit: PhantomData,
    }
}

impl<U, C, W> UnitFactory for FnFactory<U, C, W>
where
    U: ExecutionUnit,
    C: Fn() -> anyhow::Result<U> + Send + Sync + 'static,
    W: Fn(&U) -> SharedRemoteCall + Send + Sync + 'static,
{
    type Unit = U;

    fn create_unit(&self) -> anyhow::Result<U> {
        (self.create)()
    }

    fn wrap(&self, unit: &U) -> SharedRemoteCall {
        (self.wrap)(unit)
    }
}

impl<U, C, W> fmt::Debug for FnFactory<U, C, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("unit", &std::any::type_name::<U>())
            .finish()
    }
}
