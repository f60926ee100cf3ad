//! Completion-gated report retrieval
//!
//! The fetcher owns no retry loop. A `NotReady` answer is surfaced as-is and
//! the caller decides when to ask again; [`ReportFetcher::fetch_when_complete`]
//! avoids asking too early by waiting on the poller's completion signal.

use crate::client::ReportSource;
use crate::error::Result;
use crate::poller::{PollHandle, PollOutcome};
use crate::types::{CvId, Report};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a completion-gated fetch
#[derive(Clone, Debug, PartialEq)]
pub enum ReportOutcome {
    /// The job completed and the report was retrieved
    Ready(Report),
    /// The job failed server-side; no fetch was made
    JobFailed {
        /// Server-provided error message
        error: Option<String>,
    },
    /// Polling was torn down before completion; no fetch was made
    Cancelled,
}

/// Retrieves analysis reports
#[derive(Clone)]
pub struct ReportFetcher {
    source: Arc<dyn ReportSource>,
}

impl std::fmt::Debug for ReportFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportFetcher").finish_non_exhaustive()
    }
}

impl ReportFetcher {
    /// Create a fetcher over `source`
    pub fn new(source: Arc<dyn ReportSource>) -> Self {
        Self { source }
    }

    /// Fetch the report now
    ///
    /// # Errors
    /// [`Error::NotReady`](crate::Error::NotReady) if the server has no report
    /// yet, [`Error::Transport`](crate::Error::Transport) for anything else.
    pub async fn get_report(&self, cv_id: &CvId) -> Result<Report> {
        self.source.report(cv_id).await
    }

    /// Wait for the job behind `handle` to complete, then fetch once
    pub async fn fetch_when_complete(
        &self,
        cv_id: &CvId,
        handle: &PollHandle,
    ) -> Result<ReportOutcome> {
        match handle.wait_for_outcome().await {
            PollOutcome::Completed(_) => {
                debug!(cv_id = %cv_id, job_id = %handle.job_id(), "job completed, fetching report");
                let report = self.get_report(cv_id).await?;
                Ok(ReportOutcome::Ready(report))
            }
            PollOutcome::Failed(snapshot) => {
                info!(cv_id = %cv_id, job_id = %handle.job_id(), "job failed, skipping report fetch");
                Ok(ReportOutcome::JobFailed {
                    error: snapshot.error,
                })
            }
            PollOutcome::Cancelled => Ok(ReportOutcome::Cancelled),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StatusSource;
    use crate::config::PollingConfig;
    use crate::error::{Error, TransportError};
    use crate::poller::JobPoller;
    use crate::types::{JobId, JobSnapshot, JobStatus, Score};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeReports {
        calls: AtomicUsize,
        result: Mutex<Option<Result<Report>>>,
    }

    impl FakeReports {
        fn new(result: Result<Report>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Mutex::new(Some(result)),
            })
        }
    }

    #[async_trait]
    impl ReportSource for FakeReports {
        async fn report(&self, cv_id: &CvId) -> Result<Report> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Error::NotReady { cv_id: cv_id.clone() }))
        }
    }

    struct Statuses(Mutex<VecDeque<&'static str>>);

    #[async_trait]
    impl StatusSource for Statuses {
        async fn job_status(
            &self,
            job_id: &JobId,
        ) -> std::result::Result<JobSnapshot, TransportError> {
            let status = self.0.lock().unwrap().pop_front().unwrap_or("processing");
            Ok(JobSnapshot {
                job_id: job_id.clone(),
                cv_id: "abc123".into(),
                status: JobStatus::from(status),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                timeline: Vec::new(),
                error: (status == "failed").then(|| "AI provider error".to_string()),
            })
        }
    }

    fn poll(statuses: &[&'static str]) -> PollHandle {
        let source = Arc::new(Statuses(Mutex::new(statuses.iter().copied().collect())));
        JobPoller::new(
            source,
            &PollingConfig {
                interval: Duration::from_millis(2000),
            },
        )
        .start(JobId::from("job789"))
    }

    fn report() -> Report {
        Report {
            cv_id: Some("abc123".into()),
            scores: vec![Score {
                category: "overall".to_string(),
                score: 82.0,
                description: "Strong profile".to_string(),
            }],
            ..Report::default()
        }
    }

    #[tokio::test]
    async fn test_get_report_passes_not_ready_through() {
        let source = FakeReports::new(Err(Error::NotReady {
            cv_id: "abc123".into(),
        }));
        let fetcher = ReportFetcher::new(source.clone());

        let err = fetcher.get_report(&"abc123".into()).await.unwrap_err();
        assert!(err.is_not_ready());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_waits_for_completion_and_fetches_once() {
        let source = FakeReports::new(Ok(report()));
        let fetcher = ReportFetcher::new(source.clone());
        let handle = poll(&["pending", "processing", "completed"]);

        let outcome = fetcher
            .fetch_when_complete(&"abc123".into(), &handle)
            .await
            .unwrap();

        let ReportOutcome::Ready(report) = outcome else {
            panic!("expected a report, got {outcome:?}");
        };
        assert_eq!(report.overall_score(), Some(82.0));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state().fetch_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_skips_fetch() {
        let source = FakeReports::new(Ok(report()));
        let fetcher = ReportFetcher::new(source.clone());
        let handle = poll(&["processing", "failed"]);

        let outcome = fetcher
            .fetch_when_complete(&"abc123".into(), &handle)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReportOutcome::JobFailed {
                error: Some("AI provider error".to_string())
            }
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_poll_skips_fetch() {
        let source = FakeReports::new(Ok(report()));
        let fetcher = ReportFetcher::new(source.clone());
        let handle = poll(&["pending"]);
        handle.cancel();

        let outcome = fetcher
            .fetch_when_complete(&"abc123".into(), &handle)
            .await
            .unwrap();

        assert_eq!(outcome, ReportOutcome::Cancelled);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
