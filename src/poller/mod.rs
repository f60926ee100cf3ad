//! Job status polling
//!
//! [`JobPoller::start`] spawns one task per job that runs sequential
//! `fetch -> apply -> sleep` cycles:
//!
//! - the first fetch is issued immediately
//! - the interval sleep starts only after the previous fetch resolved, so at
//!   most one status request is ever in flight
//! - a terminal status (`completed` / `failed`) ends the task
//! - a fetch failure marks the status as unavailable and keeps polling; it
//!   never turns the job into `failed`
//!
//! State is published through a `watch` channel as [`PollState`]. Completion is
//! the one-way `completed: false -> true` transition of that value, and is also
//! broadcast exactly once as [`PollEvent::Completed`].
//!
//! Dropping or cancelling the [`PollHandle`] tears the task down. Cancellation
//! and every state mutation happen under the watch channel's write lock, so
//! once [`PollHandle::cancel`] returns nothing is mutated or emitted again.

use crate::client::StatusSource;
use crate::config::PollingConfig;
use crate::error::TransportError;
use crate::types::{JobId, JobSnapshot, JobStatus, TimelineEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


/// Buffered events per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Whether the latest status fetch succeeded
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusAvailability {
    /// No fetch has resolved yet
    Loading,
    /// The latest fetch succeeded
    Available,
    /// The latest fetch failed; polling continues
    Unavailable {
        /// The normalized fetch failure
        error: TransportError,
    },
}

/// Observable state of one polling session
#[derive(Clone, Debug, PartialEq)]
pub struct PollState {
    /// Job being polled
    pub job_id: JobId,
    /// Freshest server snapshot (kept across failed fetches)
    pub snapshot: Option<JobSnapshot>,
    /// Outcome of the most recent fetch
    pub availability: StatusAvailability,
    /// Set once, on the first observation of `completed`
    pub completed: bool,
    /// A terminal status was observed and polling stopped
    pub finished: bool,
    /// Successful fetches applied so far
    pub fetch_count: u64,
    /// Failed fetches since the last success
    pub consecutive_failures: u32,
}

impl PollState {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            snapshot: None,
            availability: StatusAvailability::Loading,
            completed: false,
            finished: false,
            fetch_count: 0,
            consecutive_failures: 0,
        }
    }

    /// Last status seen from the server
    pub fn status(&self) -> Option<&JobStatus> {
        self.snapshot.as_ref().map(|s| &s.status)
    }

    /// Server timeline from the latest snapshot
    pub fn timeline(&self) -> &[TimelineEvent] {
        self.snapshot
            .as_ref()
            .map(|s| s.timeline.as_slice())
            .unwrap_or(&[])
    }

    /// Job error message reported by the server
    pub fn job_error(&self) -> Option<&str> {
        self.snapshot.as_ref().and_then(|s| s.error.as_deref())
    }

    /// True when the server reported `failed`
    pub fn is_failed(&self) -> bool {
        matches!(self.status(), Some(JobStatus::Failed))
    }

    /// True while the latest fetch failed
    pub fn is_unavailable(&self) -> bool {
        matches!(self.availability, StatusAvailability::Unavailable { .. })
    }
}

/// Notification emitted by the poller
#[derive(Clone, Debug, PartialEq)]
pub enum PollEvent {
    /// A fresh snapshot was applied
    Snapshot {
        /// Job ID
        job_id: JobId,
        /// Status in the snapshot
        status: JobStatus,
    },
    /// A status fetch failed; polling continues
    StatusUnavailable {
        /// Job ID
        job_id: JobId,
        /// The normalized fetch failure
        error: TransportError,
    },
    /// First observation of `completed` (emitted once)
    Completed {
        /// Job ID
        job_id: JobId,
    },
    /// The server reported `failed` (emitted once)
    JobFailed {
        /// Job ID
        job_id: JobId,
        /// Server-provided error message
        error: Option<String>,
    },
}

/// How a polling session ended
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// The job completed
    Completed(JobSnapshot),
    /// The job failed server-side
    Failed(JobSnapshot),
    /// Polling was torn down first
    Cancelled,
}

/// Starts polling sessions against a [`StatusSource`]
#[derive(Clone)]
pub struct JobPoller {
    source: Arc<dyn StatusSource>,
    interval: Duration,
}

impl std::fmt::Debug for JobPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPoller")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl JobPoller {
    /// Create a poller with the configured interval
    pub fn new(source: Arc<dyn StatusSource>, config: &PollingConfig) -> Self {
        Self {
            source,
            interval: config.interval,
        }
    }

    /// Delay between a fetch resolving and the next one starting
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Begin polling `job_id`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, job_id: JobId) -> PollHandle {
        let (state_tx, _) = watch::channel(PollState::new(job_id.clone()));
        let state = Arc::new(state_tx);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let task = PollTask {
            source: self.source.clone(),
            job_id: job_id.clone(),
            interval: self.interval,
            state: state.clone(),
            event_tx: event_tx.clone(),
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(task.run());

        PollHandle {
            job_id,
            state,
            event_tx,
            cancel,
            task: join,
        }
    }
}

/// Owner of one polling session
///
/// Dropping the handle cancels polling.
#[derive(Debug)]
pub struct PollHandle {
    job_id: JobId,
    state: Arc<watch::Sender<PollState>>,
    event_tx: broadcast::Sender<PollEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Job being polled
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Copy of the current state
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state transition
    pub fn watch(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Subscribe to poll events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.event_tx.subscribe()
    }

    /// Stop polling
    ///
    /// Synchronous: after this returns, no fetch result is applied and no
    /// event is emitted, even if a request resolves later.
    pub fn cancel(&self) {
        let token = &self.cancel;
        self.state.send_if_modified(|_| {
            token.cancel();
            false
        });
    }

    /// True once [`cancel`](Self::cancel) was called or the handle is being dropped
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the polling task has exited
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    /// True once the completion signal fired
    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    /// Wait until the job reaches a terminal status or polling is cancelled
    pub async fn wait_for_outcome(&self) -> PollOutcome {
        let mut rx = self.state.subscribe();
        tokio::select! {
            biased;
            result = rx.wait_for(|s| s.finished) => {
                match result.ok().and_then(|s| s.snapshot.clone()) {
                    Some(snapshot) if snapshot.status == JobStatus::Completed => {
                        PollOutcome::Completed(snapshot)
                    }
                    Some(snapshot) => PollOutcome::Failed(snapshot),
                    None => PollOutcome::Cancelled,
                }
            }
            _ = self.cancel.cancelled() => PollOutcome::Cancelled,
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The spawned side of a polling session
struct PollTask {
    source: Arc<dyn StatusSource>,
    job_id: JobId,
    interval: Duration,
    state: Arc<watch::Sender<PollState>>,
    event_tx: broadcast::Sender<PollEvent>,
    cancel: CancellationToken,
}

impl PollTask {
    async fn run(self) {
        info!(job_id = %self.job_id, interval_ms = self.interval.as_millis() as u64, "job polling started");

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.source.job_status(&self.job_id) => result,
            };

            let applied = match result {
                Ok(snapshot) => self.apply_snapshot(snapshot),
                Err(error) => self.apply_failure(error).map(|()| false),
            };

            match applied {
                // Cancelled while the fetch was resolving
                None => break,
                Some(true) => {
                    info!(job_id = %self.job_id, "job reached terminal status, polling stopped");
                    return;
                }
                Some(false) => {}
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!(job_id = %self.job_id, "job polling cancelled");
    }

    /// Apply a mutation unless polling was cancelled
    ///
    /// Returns `None` if cancelled. Events are emitted under the same lock, so
    /// none can follow a completed `cancel()`.
    fn mutate<F>(&self, f: F) -> Option<bool>
    where
        F: FnOnce(&mut PollState) -> (bool, Vec<PollEvent>),
    {
        let mut outcome = None;
        self.state.send_if_modified(|state| {
            if self.cancel.is_cancelled() {
                return false;
            }
            let (terminal, events) = f(state);
            for event in events {
                // No subscribers is fine
                let _ = self.event_tx.send(event);
            }
            outcome = Some(terminal);
            true
        });
        outcome
    }

    /// Replace the cached snapshot; returns `Some(true)` on a terminal status
    fn apply_snapshot(&self, snapshot: JobSnapshot) -> Option<bool> {
        let job_id = self.job_id.clone();
        self.mutate(move |state| {
            let status = snapshot.status.clone();
            let mut events = vec![PollEvent::Snapshot {
                job_id: job_id.clone(),
                status: status.clone(),
            }];

            debug!(
                job_id = %job_id,
                status = %status,
                timeline_len = snapshot.timeline.len(),
                "job status fetched"
            );

            let was_finished = state.finished;
            match status {
                JobStatus::Completed if !state.completed => {
                    state.completed = true;
                    info!(job_id = %job_id, "job completed");
                    events.push(PollEvent::Completed {
                        job_id: job_id.clone(),
                    });
                }
                JobStatus::Failed if !was_finished => {
                    warn!(job_id = %job_id, error = ?snapshot.error, "job failed");
                    events.push(PollEvent::JobFailed {
                        job_id: job_id.clone(),
                        error: snapshot.error.clone(),
                    });
                }
                _ => {}
            }

            let terminal = status.is_terminal();
            state.finished = terminal;
            state.snapshot = Some(snapshot);
            state.availability = StatusAvailability::Available;
            state.fetch_count += 1;
            state.consecutive_failures = 0;

            (terminal, events)
        })
    }

    /// Record a failed fetch without touching the cached snapshot
    fn apply_failure(&self, error: TransportError) -> Option<()> {
        let job_id = self.job_id.clone();
        self.mutate(move |state| {
            state.consecutive_failures += 1;
            warn!(
                job_id = %job_id,
                error = %error,
                consecutive_failures = state.consecutive_failures,
                "job status unavailable, will retry"
            );
            state.availability = StatusAvailability::Unavailable {
                error: error.clone(),
            };
            (false, vec![PollEvent::StatusUnavailable { job_id, error }])
        })
        .map(|_| ())
    }
}
