use crate::errors::UnitFailure;
use tokio::sync::watch;
use tracing::trace;

/// Creates a linked reporter/signal pair for one execution unit.
///
/// The unit keeps the [`FailureReporter`] and calls [`FailureReporter::report`]
/// when it dies; the pool subscribes to the [`FailureSignal`]. Dropping the
/// reporter without reporting counts as [`UnitFailure::Closed`].
pub fn failure_channel() -> (FailureReporter, FailureSignal) {
    let (tx, rx) = watch::channel(None);
    (FailureReporter { tx }, FailureSignal { rx })
}

/// Sending half of a unit's failure signal.
#[derive(Debug)]
pub struct FailureReporter {
    tx: watch::Sender<Option<UnitFailure>>,
}

impl FailureReporter {
    /// Records the failure. Only the first report sticks.
    pub fn report(&self, failure: UnitFailure) {
        let accepted = self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(failure);
            true
        });
        if accepted {
            trace!("unit failure reported");
        }
    }

    /// Whether a failure has already been reported.
    pub fn has_failed(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Receiving half of a unit's failure signal.
#[derive(Debug, Clone)]
pub struct FailureSignal {
    rx: watch::Receiver<Option<UnitFailure>>,
}

impl FailureSignal {
    /// Resolves once the unit fails.
    ///
    /// Never resolves for a unit that stays healthy while its reporter is alive.
    pub async fn recv(mut self) -> UnitFailure {
        loop {
            if let Some(failure) = self.rx.borrow_and_update().clone() {
                return failure;
            }
            if self.rx.changed().await.is_err() {
                // Reporter dropped; a value may have landed just before.
                return self.rx.borrow().clone().unwrap_or(UnitFailure::Closed);
            }
        }
    }

    /// The failure, if one was reported already.
    pub fn failure(&self) -> Option<UnitFailure> {
        self.rx.borrow().clone()
    }
}
