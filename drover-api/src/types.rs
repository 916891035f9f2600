use crate::unit::RemoteCall;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// Type aliases for common types
pub type Value = serde_json::Value;
pub type UnitId = u64;
pub type TaskId = u64;
pub type SharedRemoteCall = Arc<dyn RemoteCall>;
pub type BoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
