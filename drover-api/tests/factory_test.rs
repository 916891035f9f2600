use async_trait::async_trait;
use drover_api::{
    failure_channel, unit_factory, ExecutionUnit, FailureReporter, FailureSignal, RemoteCall, RemoteError,
    SharedRemoteCall, UnitFactory, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingUnit {
    id: usize,
    signal: FailureSignal,
    _reporter: FailureReporter,
    terminated: Arc<AtomicUsize>,
}

impl ExecutionUnit for CountingUnit {
    fn failure_signal(&self) -> FailureSignal {
        self.signal.clone()
    }

    fn terminate(&self) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

struct Greeter {
    unit: usize,
}

#[async_trait]
impl RemoteCall for Greeter {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        match method {
            "greet" => {
                let name = args.first().and_then(Value::as_str).unwrap_or("stranger");
                Ok(Value::String(format!("hello {name} from unit {}", self.unit)))
            }
            other => Err(RemoteError::MethodNotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_factory(terminated: Arc<AtomicUsize>) -> impl UnitFactory<Unit = CountingUnit> {
        let next = AtomicUsize::new(0);
        unit_factory(
            move || {
                let (reporter, signal) = failure_channel();
                Ok(CountingUnit {
                    id: next.fetch_add(1, Ordering::SeqCst) + 1,
                    signal,
                    _reporter: reporter,
                    terminated: terminated.clone(),
                })
            },
            |unit: &CountingUnit| Arc::new(Greeter { unit: unit.id }) as SharedRemoteCall,
        )
    }

    #[tokio::test]
    async fn test_closure_factory_creates_and_wraps() {
        let terminated = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(terminated.clone());

        let first = factory.create_unit().unwrap();
        let second = factory.create_unit().unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let call = factory.wrap(&second);
        let reply = call.call("greet", vec![Value::String("ana".to_string())]).await.unwrap();
        assert_eq!(reply, Value::String("hello ana from unit 2".to_string()));

        first.terminate();
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let factory = counting_factory(Arc::new(AtomicUsize::new(0)));
        let unit = factory.create_unit().unwrap();

        let err = factory.wrap(&unit).call("wave", vec![]).await.unwrap_err();
        assert!(matches!(err, RemoteError::MethodNotFound(ref m) if m == "wave"));
    }

    #[test]
    fn test_creation_failure_surfaces() {
        let factory = unit_factory(
            || -> anyhow::Result<CountingUnit> { Err(anyhow::anyhow!("no capacity")) },
            |unit: &CountingUnit| Arc::new(Greeter { unit: unit.id }) as SharedRemoteCall,
        );

        let err = factory.create_unit().err().unwrap();
        assert_eq!(err.to_string(), "no capacity");
    }
}
