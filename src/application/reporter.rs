use crate::config::ReportSettings;
use crate::domain::ports::{ReportSink, ReportSinkBox};
use crate::domain::transaction::{Delivery, Outcome};
use crate::error::SendError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Fixed-delay retry budget for outbound reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl From<&ReportSettings> for RetryPolicy {
    fn from(settings: &ReportSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.retry_delay_ms),
        )
    }
}

/// Sends an outcome through a [`ReportSink`], retrying transient failures.
///
/// Terminal rejections stop immediately. Every path ends in a [`Delivery`];
/// the caller always gets to release the transaction.
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn ReportSink>,
    policy: RetryPolicy,
}

impl Reporter {
    pub fn new(sink: ReportSinkBox, policy: RetryPolicy) -> Self {
        Self {
            sink: Arc::from(sink),
            policy,
        }
    }

    pub async fn report(&self, outcome: &Outcome) -> Delivery {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sink.send(outcome).await {
                Ok(()) => {
                    info!(
                        id = %outcome.id,
                        status = outcome.status.as_str(),
                        attempt,
                        "Transaction status delivered"
                    );
                    return Delivery::Delivered { attempts: attempt };
                }
                Err(SendError::Rejected { kind, message }) => {
                    warn!(
                        id = %outcome.id,
                        ?kind,
                        %message,
                        attempt,
                        "Transaction status rejected by remote"
                    );
                    return Delivery::Rejected {
                        kind,
                        message,
                        attempts: attempt,
                    };
                }
                Err(SendError::Transient(reason)) => {
                    if attempt >= self.policy.max_attempts {
                        error!(
                            id = %outcome.id,
                            attempts = attempt,
                            %reason,
                            "Giving up on transaction status report"
                        );
                        return Delivery::Exhausted {
                            attempts: attempt,
                            last_error: reason,
                        };
                    }
                    warn!(
                        id = %outcome.id,
                        attempt,
                        %reason,
                        "Failed to send transaction status, retrying"
                    );
                    sleep(self.policy.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::Amount;
    use crate::domain::transaction::OutcomeStatus;
    use crate::error::RejectionKind;
    use crate::infrastructure::in_memory::RecordingReportSink;
    use tokio::time::Instant;

    fn outcome() -> Outcome {
        Outcome {
            id: "TRX-9".to_string(),
            status: OutcomeStatus::Success,
            total_inserted: Amount::new(15_000),
            overpaid: Amount::ZERO,
            remaining_due: Amount::ZERO,
        }
    }

    fn transient() -> SendError {
        SendError::Transient("connection refused".to_string())
    }

    #[test]
    fn test_policy_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let sink = RecordingReportSink::scripted(vec![Err(transient()), Err(transient())]);
        let reporter = Reporter::new(
            Box::new(sink.clone()),
            RetryPolicy::new(3, Duration::from_secs(1)),
        );

        let start = Instant::now();
        let delivery = reporter.report(&outcome()).await;

        assert_eq!(delivery, Delivery::Delivered { attempts: 3 });
        assert_eq!(sink.attempts(), 3);
        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(Instant::now() - start, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_retries() {
        let sink = RecordingReportSink::scripted(vec![
            Err(transient()),
            Err(transient()),
            Err(transient()),
        ]);
        let reporter = Reporter::new(
            Box::new(sink.clone()),
            RetryPolicy::new(2, Duration::from_millis(100)),
        );

        let delivery = reporter.report(&outcome()).await;
        assert_eq!(
            delivery,
            Delivery::Exhausted {
                attempts: 2,
                last_error: "connection refused".to_string(),
            }
        );
        assert_eq!(sink.attempts(), 2);
        assert!(sink.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_rejection_is_not_retried() {
        let sink = RecordingReportSink::scripted(vec![Err(SendError::Rejected {
            kind: RejectionKind::AlreadySettled,
            message: "already paid".to_string(),
        })]);
        let reporter = Reporter::new(
            Box::new(sink.clone()),
            RetryPolicy::new(5, Duration::from_secs(1)),
        );

        let delivery = reporter.report(&outcome()).await;
        assert_eq!(
            delivery,
            Delivery::Rejected {
                kind: RejectionKind::AlreadySettled,
                message: "already paid".to_string(),
                attempts: 1,
            }
        );
        assert_eq!(sink.attempts(), 1);
    }
}
