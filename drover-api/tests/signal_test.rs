use drover_api::{failure_channel, UnitFailure};
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reported_failure_is_received() {
        let (reporter, signal) = failure_channel();
        let waiter = tokio::spawn(signal.recv());

        tokio::time::sleep(Duration::from_millis(10)).await;
        reporter.report(UnitFailure::Exited(Some(2)));

        assert_eq!(waiter.await.unwrap(), UnitFailure::Exited(Some(2)));
        assert!(reporter.has_failed());
    }

    #[tokio::test]
    async fn test_first_report_wins() {
        let (reporter, signal) = failure_channel();
        reporter.report(UnitFailure::Error("first".to_string()));
        reporter.report(UnitFailure::Closed);

        assert_eq!(signal.failure(), Some(UnitFailure::Error("first".to_string())));
        assert_eq!(signal.recv().await, UnitFailure::Error("first".to_string()));
    }

    #[tokio::test]
    async fn test_dropped_reporter_counts_as_closed() {
        let (reporter, signal) = failure_channel();
        drop(reporter);

        assert_eq!(signal.recv().await, UnitFailure::Closed);
    }

    #[tokio::test]
    async fn test_report_before_drop_is_kept() {
        let (reporter, signal) = failure_channel();
        reporter.report(UnitFailure::Exited(None));
        drop(reporter);

        assert_eq!(signal.recv().await, UnitFailure::Exited(None));
    }

    #[tokio::test]
    async fn test_healthy_unit_never_signals() {
        let (reporter, signal) = failure_channel();

        let outcome = tokio::time::timeout(Duration::from_millis(30), signal.clone().recv()).await;
        assert!(outcome.is_err());
        assert!(!reporter.has_failed());
        assert_eq!(signal.failure(), None);
    }
}
