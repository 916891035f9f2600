// A pool of OS-thread execution units.
//
// Each unit is a dedicated thread serving requests from a channel. Asking a
// unit to panic kills its thread; the pool replaces the unit and later tasks
// run on a fresh one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use drover::logging;
use drover::{
    failure_channel, unit_interface, ExecutionUnit, FailureReporter, FailureSignal, RemoteCall, RemoteError,
    SharedRemoteCall, UnitFactory, UnitFailure, Value, WorkerPool,
};
use tokio::sync::oneshot;
use tracing::{info, warn};

enum Request {
    Call {
        method: String,
        args: Vec<Value>,
        reply: oneshot::Sender<Result<Value, RemoteError>>,
    },
    Shutdown,
}

struct ThreadUnit {
    tx: mpsc::Sender<Request>,
    signal: FailureSignal,
}

impl ExecutionUnit for ThreadUnit {
    fn failure_signal(&self) -> FailureSignal {
        self.signal.clone()
    }

    fn terminate(&self) {
        let _ = self.tx.send(Request::Shutdown);
    }
}

struct ThreadCall {
    tx: mpsc::Sender<Request>,
}

#[async_trait]
impl RemoteCall for ThreadCall {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Call {
                method: method.to_string(),
                args,
                reply,
            })
            .map_err(|_| RemoteError::Failed("unit thread is gone".to_string()))?;
        rx.await
            .map_err(|_| RemoteError::Failed("unit thread dropped the call".to_string()))?
    }
}

fn serve(rx: mpsc::Receiver<Request>, reporter: FailureReporter) {
    while let Ok(request) = rx.recv() {
        let (method, args, reply) = match request {
            Request::Shutdown => return,
            Request::Call { method, args, reply } => (method, args, reply),
        };
        match panic::catch_unwind(AssertUnwindSafe(|| handle(&method, &args))) {
            Ok(result) => {
                let _ = reply.send(result);
            }
            Err(_) => {
                reporter.report(UnitFailure::Error("worker thread panicked".to_string()));
                // Dead until terminated; the pool settles the pending call.
                let _pending = reply;
                while let Ok(request) = rx.recv() {
                    if let Request::Shutdown = request {
                        return;
                    }
                }
                return;
            }
        }
    }
}

fn handle(method: &str, args: &[Value]) -> Result<Value, RemoteError> {
    match method {
        "fib" => {
            let n = args
                .first()
                .and_then(Value::as_u64)
                .ok_or_else(|| RemoteError::Failed("fib expects a number".to_string()))?;
            Ok(Value::from(fib(n)))
        }
        "nap" => {
            let millis = args.first().and_then(Value::as_u64).unwrap_or(10);
            thread::sleep(Duration::from_millis(millis));
            Ok(Value::Null)
        }
        "panic" => panic!("asked to panic"),
        other => Err(RemoteError::MethodNotFound(other.to_string())),
    }
}

fn fib(n: u64) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        (a, b) = (b, a.wrapping_add(b));
    }
    a
}

struct ThreadFactory;

impl UnitFactory for ThreadFactory {
    type Unit = ThreadUnit;

    fn create_unit(&self) -> anyhow::Result<ThreadUnit> {
        let (tx, rx) = mpsc::channel();
        let (reporter, signal) = failure_channel();
        thread::Builder::new()
            .name("drover-unit".to_string())
            .spawn(move || serve(rx, reporter))?;
        Ok(ThreadUnit { tx, signal })
    }

    fn wrap(&self, unit: &ThreadUnit) -> SharedRemoteCall {
        Arc::new(ThreadCall { tx: unit.tx.clone() })
    }
}

#[unit_interface]
trait MathWorker {
    fn fib(&self, n: u64) -> u64;

    fn nap(&self, millis: u64);

    #[call(method = "panic")]
    fn explode(&self);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_development();

    let pool = WorkerPool::builder(ThreadFactory)
        .max_units(2)
        .max_tasks_per_unit(4)
        .idle_timeout(Duration::from_secs(2))
        .on_stats_update(|stats| tracing::trace!(?stats, "pool stats"))
        .build()?;

    let inputs: Vec<u64> = (20..30).collect();
    let calls: Vec<_> = inputs.iter().map(|&n| pool.fib(n)).collect();
    for (n, result) in inputs.iter().zip(futures::future::join_all(calls).await) {
        let value = result?;
        info!(n, value, "computed");
    }

    let napping = pool.nap(200);
    match pool.explode().await {
        Err(error) => warn!(%error, "unit crashed as asked"),
        Ok(()) => warn!("unit survived a panic"),
    }
    napping.await?;

    let after = pool.fib(10).await?;
    info!(after, stats = ?pool.stats(), "pool recovered");

    pool.terminate_all();
    Ok(())
}
