// src/cancel.rs
//! Cancelling scheduled retries.
//!
//! A retry is three records kept apart: the delayed entry in the scheduler,
//! the failure detail and the attempt counter. The store has no multi-key
//! transactions, so every step is idempotent and the order is fixed: retry
//! state first, the scheduler entry second. If the second step fails the job
//! stays scheduled with no history and simply runs once more; the reverse
//! order could strand a counter nobody will ever look up again.

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::error::{Result, RetryError};
use crate::fingerprint::RetryFingerprint;
use crate::job::JobDescriptor;
use crate::retry_state::{RetryState, RetryStatus};
use crate::scheduler::DelayedScheduler;
use crate::store::KeyValueStore;
use crate::utils::constants::DEFAULT_CANCEL_CONCURRENCY;

#[derive(Debug)]
pub enum CancelStatus {
    /// State removed and the delayed entry removed.
    Cancelled,
    /// State removed; the scheduler had no matching entry. Already cancelled or never scheduled.
    NotScheduled,
    /// State removed but the scheduler removal failed. The job may still run once.
    Partial { error: RetryError },
    /// State removal failed; the scheduler was left untouched.
    Failed { error: RetryError },
}

#[derive(Debug)]
pub struct CancelOutcome {
    pub job: JobDescriptor,
    pub fingerprint: RetryFingerprint,
    pub status: CancelStatus,
}

impl CancelOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, CancelStatus::Cancelled | CancelStatus::NotScheduled)
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.status, CancelStatus::Partial { .. })
    }

    pub fn error(&self) -> Option<&RetryError> {
        match &self.status {
            CancelStatus::Partial { error } | CancelStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Per-bucket tally.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CancelSummary {
    pub cancelled: usize,
    pub not_scheduled: usize,
    pub partial: usize,
    pub failed: usize,
}

impl CancelSummary {
    pub fn from_outcomes(outcomes: &[CancelOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut acc, outcome| {
            match outcome.status {
                CancelStatus::Cancelled => acc.cancelled += 1,
                CancelStatus::NotScheduled => acc.not_scheduled += 1,
                CancelStatus::Partial { .. } => acc.partial += 1,
                CancelStatus::Failed { .. } => acc.failed += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.cancelled + self.not_scheduled + self.partial + self.failed
    }

    pub fn all_succeeded(&self) -> bool {
        self.partial == 0 && self.failed == 0
    }
}

/// Removes retry state and delayed entries, one job or one bucket at a time.
pub struct RetryCanceller<S, D> {
    state: RetryState<S>,
    scheduler: D,
    concurrency: usize,
}

impl<S, D> RetryCanceller<S, D>
where
    S: KeyValueStore,
    D: DelayedScheduler,
{
    pub fn new(state: RetryState<S>, scheduler: D) -> Self {
        Self {
            state,
            scheduler,
            concurrency: DEFAULT_CANCEL_CONCURRENCY,
        }
    }

    /// Max jobs of one bucket in flight at once. Clamped to at least one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn state(&self) -> &RetryState<S> {
        &self.state
    }

    pub fn scheduler(&self) -> &D {
        &self.scheduler
    }

    pub async fn cancel_one(&self, job: &JobDescriptor) -> CancelOutcome {
        let fingerprint = self.state.fingerprint(job);

        let status = match self.state.delete_state(&fingerprint).await {
            Err(error) => {
                error!(fingerprint = %fingerprint, class = %job.class, error = %error, "failed to delete retry state");
                CancelStatus::Failed { error }
            }
            Ok(()) => match self.scheduler.remove(&job.class, &job.args).await {
                Ok(true) => {
                    info!(fingerprint = %fingerprint, class = %job.class, "retry cancelled");
                    CancelStatus::Cancelled
                }
                Ok(false) => {
                    info!(fingerprint = %fingerprint, class = %job.class, "retry state cleared, nothing scheduled");
                    CancelStatus::NotScheduled
                }
                Err(error) => {
                    warn!(fingerprint = %fingerprint, class = %job.class, error = %error, "retry state cleared but delayed entry not removed");
                    CancelStatus::Partial { error }
                }
            },
        };

        CancelOutcome {
            job: job.clone(),
            fingerprint,
            status,
        }
    }

    /// Cancels every job scheduled at `timestamp`.
    ///
    /// Only the initial peek can fail the call. Each job gets its own outcome,
    /// returned in bucket order.
    pub async fn cancel_bucket(&self, timestamp: i64) -> Result<Vec<CancelOutcome>> {
        let jobs = self.scheduler.peek(timestamp, 0, 0).await?;
        info!(timestamp, jobs = jobs.len(), "cancelling retry bucket");

        let outcomes: Vec<CancelOutcome> = stream::iter(jobs.iter())
            .map(|job| self.cancel_one(job))
            .buffered(self.concurrency)
            .collect()
            .await;

        let summary = CancelSummary::from_outcomes(&outcomes);
        if summary.all_succeeded() {
            info!(timestamp, total = summary.total(), "retry bucket cancelled");
        } else {
            warn!(
                timestamp,
                total = summary.total(),
                partial = summary.partial,
                failed = summary.failed,
                "retry bucket cancelled with errors"
            );
        }

        Ok(outcomes)
    }

    /// Retry status of every job in a bucket. A job whose state cannot be read
    /// carries its own error.
    pub async fn bucket_status(
        &self,
        timestamp: i64,
    ) -> Result<Vec<(JobDescriptor, Result<RetryStatus>)>> {
        let jobs = self.scheduler.peek(timestamp, 0, 0).await?;

        let statuses: Vec<(JobDescriptor, Result<RetryStatus>)> = stream::iter(jobs.into_iter())
            .map(|job| async move {
                let status = self.state.status(&job).await;
                (job, status)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::MemoryScheduler;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn job(arg: &str) -> JobDescriptor {
        JobDescriptor::new("SendEmail", vec![json!(arg)])
    }

    fn canceller() -> (RetryCanceller<MemoryStore, MemoryScheduler>, MemoryStore, MemoryScheduler) {
        let store = MemoryStore::new();
        let scheduler = MemoryScheduler::new();
        let canceller = RetryCanceller::new(RetryState::new(store.clone()), scheduler.clone());
        (canceller, store, scheduler)
    }

    #[tokio::test]
    async fn cancel_one_clears_everything() {
        let (canceller, store, scheduler) = canceller();
        let fp = canceller.state().fingerprint(&job("a"));
        canceller.state().set_attempts(&fp, 1).await.unwrap();
        scheduler.enqueue_at(1_700_000_000, job("a")).await;

        let outcome = canceller.cancel_one(&job("a")).await;
        assert!(matches!(outcome.status, CancelStatus::Cancelled));
        assert!(store.is_empty().await);
        assert_eq!(scheduler.len().await, 0);
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_a_no_op() {
        let (canceller, store, _) = canceller();
        let outcome = canceller.cancel_one(&job("nobody")).await;
        assert!(matches!(outcome.status, CancelStatus::NotScheduled));
        assert!(outcome.is_success());
        assert!(outcome.error().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn bucket_status_reports_attempts() {
        let (canceller, _, scheduler) = canceller();
        scheduler.enqueue_at(10, job("a")).await;
        scheduler.enqueue_at(10, job("b")).await;
        let fp = canceller.state().fingerprint(&job("b"));
        canceller.state().set_attempts(&fp, 3).await.unwrap();

        let statuses = canceller.bucket_status(10).await.unwrap();
        let attempts: Vec<i64> = statuses
            .into_iter()
            .map(|(_, status)| status.unwrap().attempts)
            .collect();
        assert_eq!(attempts, vec![0, 3]);
    }

    #[test]
    fn summary_counts() {
        let outcome = |status| CancelOutcome {
            job: job("a"),
            fingerprint: crate::fingerprint::derive(&job("a")),
            status,
        };
        let outcomes = vec![
            outcome(CancelStatus::Cancelled),
            outcome(CancelStatus::NotScheduled),
            outcome(CancelStatus::Partial { error: RetryError::Unavailable("down".into()) }),
        ];

        let summary = CancelSummary::from_outcomes(&outcomes);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.partial, 1);
        assert!(!summary.all_succeeded());
    }
}
