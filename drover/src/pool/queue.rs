use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use drover_api::{PoolError, PoolResult, TaskId, Value};
use tokio::sync::oneshot;

/// Sending half of a task's completion handle.
pub(crate) type ReplySender = oneshot::Sender<PoolResult<Value>>;

/// A submitted task that has not been dispatched yet.
#[derive(Debug)]
pub(crate) struct PendingTask {
    pub id: TaskId,
    pub method: String,
    pub args: Vec<Value>,
    pub reply: ReplySender,
}

impl PendingTask {
    /// Settles the task without dispatching it.
    pub fn reject(self, error: PoolError) {
        // The caller may have dropped its handle already.
        let _ = self.reply.send(Err(error));
    }
}

/// FIFO backlog of tasks waiting for a unit.
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<PendingTask>,
    next_id: TaskId,
}

impl TaskQueue {
    /// Appends a task at the tail and returns its handle.
    pub fn enqueue(&mut self, method: String, args: Vec<Value>) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;

        let (reply, rx) = oneshot::channel();
        self.tasks.push_back(PendingTask {
            id,
            method,
            args,
            reply,
        });
        TaskHandle { id, rx }
    }

    pub fn pop(&mut self) -> Option<PendingTask> {
        self.tasks.pop_front()
    }

    /// Puts a popped task back at the head.
    pub fn requeue(&mut self, task: PendingTask) {
        self.tasks.push_front(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Removes every queued task, returning them unsettled.
    pub fn drain(&mut self) -> Vec<PendingTask> {
        self.tasks.drain(..).collect()
    }
}

/// Eventual result of a submitted task.
///
/// Resolves with the remote call's outcome. Resolves with
/// [`PoolError::Abandoned`] if the pool drops the task, which happens on
/// `terminate_all` and when the last pool handle goes away.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    rx: oneshot::Receiver<PoolResult<Value>>,
}

impl TaskHandle {
    /// Submission sequence number of the task.
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Future for TaskHandle {
    type Output = PoolResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PoolError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fifo_order_and_ids() {
        let mut queue = TaskQueue::default();
        let a = queue.enqueue("echo".into(), vec![json!("a")]);
        let b = queue.enqueue("echo".into(), vec![json!("b")]);
        let c = queue.enqueue("echo".into(), vec![json!("c")]);

        assert_eq!((a.id(), b.id(), c.id()), (0, 1, 2));
        assert_eq!(queue.len(), 3);

        let order: Vec<Value> = std::iter::from_fn(|| queue.pop())
            .map(|task| task.args[0].clone())
            .collect();
        assert_eq!(order, vec![json!("a"), json!("b"), json!("c")]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_task_settles_handle() {
        let mut queue = TaskQueue::default();
        let handle = queue.enqueue("echo".into(), vec![]);
        queue.pop().unwrap().reject(PoolError::UnitCreation("boom".into()));

        let err = handle.await.unwrap_err();
        assert!(matches!(err, PoolError::UnitCreation(msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_drained_task_is_abandoned() {
        let mut queue = TaskQueue::default();
        let handle = queue.enqueue("echo".into(), vec![]);
        drop(queue.drain());

        assert!(matches!(handle.await, Err(PoolError::Abandoned)));
    }
}
