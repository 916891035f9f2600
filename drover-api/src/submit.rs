use crate::errors::PoolResult;
use crate::types::{BoxedFuture, Value};

/// Accepts `(method, args)` submissions and yields their eventual results.
///
/// The submission happens when `submit_call` is invoked, not when the
/// returned future is first polled. Typed proxies generated by
/// [`unit_interface`](crate::unit_interface) are implemented for every
/// `Submitter`.
pub trait Submitter {
    fn submit_call(&self, method: &str, args: Vec<Value>) -> BoxedFuture<'static, PoolResult<Value>>;
}

impl<S: Submitter + ?Sized> Submitter for &S {
    fn submit_call(&self, method: &str, args: Vec<Value>) -> BoxedFuture<'static, PoolResult<Value>> {
        (**self).submit_call(method, args)
    }
}

impl<S: Submitter + ?Sized> Submitter for std::sync::Arc<S> {
    fn submit_call(&self, method: &str, args: Vec<Value>) -> BoxedFuture<'static, PoolResult<Value>> {
        (**self).submit_call(method, args)
    }
}
