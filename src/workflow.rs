//! One user's upload -> analyze -> poll -> report flow
//!
//! [`AnalysisSession`] holds the identifiers produced by each step and the
//! active [`PollHandle`]. Each step checks that its predecessor ran, so an
//! analysis can't start without an uploaded CV and a report is never fetched
//! for a job that hasn't completed.

use crate::artifact::Artifact;
use crate::client::AnalyzerClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::poller::{JobPoller, PollEvent, PollHandle, PollState};
use crate::report::{ReportFetcher, ReportOutcome};
use crate::session::SessionState;
use crate::types::{AnalysisStarted, AnalyzeRequest, CvId, JobId, Report, UploadReceipt};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Stateful driver of a single CV analysis
#[derive(Debug)]
pub struct AnalysisSession {
    client: Arc<AnalyzerClient>,
    poller: JobPoller,
    reports: ReportFetcher,
    artifact: Option<Artifact>,
    upload: Option<UploadReceipt>,
    job: Option<AnalysisStarted>,
    polling: Option<PollHandle>,
}

impl AnalysisSession {
    /// Create a session talking to the configured service
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the configuration is invalid.
    pub fn new(config: &Config, session: SessionState) -> Result<Self> {
        let client = AnalyzerClient::new(config, session)?;
        Ok(Self::with_client(Arc::new(client), config))
    }

    /// Create a session around an existing client
    pub fn with_client(client: Arc<AnalyzerClient>, config: &Config) -> Self {
        Self {
            poller: JobPoller::new(client.clone(), &config.polling),
            reports: ReportFetcher::new(client.clone()),
            client,
            artifact: None,
            upload: None,
            job: None,
            polling: None,
        }
    }

    /// Shared client
    pub fn client(&self) -> &Arc<AnalyzerClient> {
        &self.client
    }

    /// Choose the file to upload
    ///
    /// A rejected artifact leaves the previous selection in place.
    pub fn select_artifact(&mut self, artifact: Artifact) -> Result<()> {
        if let Err(e) = self.client.validator().validate(&artifact) {
            debug!(
                filename = artifact.name(),
                reason = e.reason(),
                "artifact rejected"
            );
            return Err(e.into());
        }
        self.artifact = Some(artifact);
        Ok(())
    }

    /// Currently selected artifact
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Upload the selected artifact
    ///
    /// On success the receipt replaces any earlier CV, and any job or polling
    /// tied to that earlier CV is discarded. On failure the artifact is kept so
    /// the user can retry.
    pub async fn upload(&mut self) -> Result<UploadReceipt> {
        let artifact = self.artifact.as_ref().ok_or(Error::NoArtifact)?;
        let receipt = self.client.upload_artifact(artifact).await?;

        self.stop_polling();
        self.job = None;
        self.artifact = None;
        self.upload = Some(receipt.clone());
        Ok(receipt)
    }

    /// Receipt of the last successful upload
    pub fn upload_receipt(&self) -> Option<&UploadReceipt> {
        self.upload.as_ref()
    }

    /// CV uploaded in this session
    pub fn cv_id(&self) -> Option<&CvId> {
        self.upload.as_ref().map(|u| &u.cv_id)
    }

    /// Start analysing the uploaded CV and begin polling its job
    ///
    /// Any previous polling session is torn down before the request is sent.
    pub async fn start_analysis(&mut self, request: AnalyzeRequest) -> Result<AnalysisStarted> {
        let cv_id = self.cv_id().cloned().ok_or(Error::NoCvId)?;

        self.stop_polling();
        self.job = None;

        let started = self.client.start_analysis(&cv_id, &request).await?;
        self.polling = Some(self.poller.start(started.job_id.clone()));
        self.job = Some(started.clone());
        Ok(started)
    }

    /// Job started in this session
    pub fn job_id(&self) -> Option<&JobId> {
        self.job.as_ref().map(|j| &j.job_id)
    }

    /// Active polling session
    pub fn poll_handle(&self) -> Option<&PollHandle> {
        self.polling.as_ref()
    }

    /// Snapshot of the active poller's state
    pub fn poll_state(&self) -> Option<PollState> {
        self.polling.as_ref().map(PollHandle::state)
    }

    /// Observe state transitions of the active poller
    pub fn watch(&self) -> Option<watch::Receiver<PollState>> {
        self.polling.as_ref().map(PollHandle::watch)
    }

    /// Subscribe to events of the active poller
    pub fn subscribe(&self) -> Option<broadcast::Receiver<PollEvent>> {
        self.polling.as_ref().map(PollHandle::subscribe)
    }

    /// Wait for the active job to finish, then fetch its report once
    ///
    /// # Errors
    /// [`Error::NoCvId`] before an upload, [`Error::NotReady`] when no
    /// analysis was started, and the fetch error otherwise.
    pub async fn report(&self) -> Result<ReportOutcome> {
        let cv_id = self.cv_id().ok_or(Error::NoCvId)?;
        let Some(handle) = self.polling.as_ref() else {
            return Err(Error::NotReady {
                cv_id: cv_id.clone(),
            });
        };

        let outcome = self.reports.fetch_when_complete(cv_id, handle).await;
        if let Err(e) = &outcome {
            warn!(cv_id = %cv_id, error = %e, "report fetch failed");
        }
        outcome
    }

    /// Fetch the report immediately, without waiting on the poller
    pub async fn fetch_report_now(&self) -> Result<Report> {
        let cv_id = self.cv_id().ok_or(Error::NoCvId)?;
        self.reports.get_report(cv_id).await
    }

    /// Tear down polling and forget every identifier
    pub fn reset(&mut self) {
        self.stop_polling();
        self.artifact = None;
        self.upload = None;
        self.job = None;
        info!("analysis session reset");
    }

    fn stop_polling(&mut self) {
        if let Some(handle) = self.polling.take() {
            debug!(job_id = %handle.job_id(), "stopping previous polling session");
            handle.cancel();
        }
    }
}
