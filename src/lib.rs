//! # cv-analyzer-client
//!
//! Client-side orchestration for an asynchronous CV analysis service.
//!
//! A CV goes through four steps, each gated on the previous one:
//!
//! 1. **Validate** the selected file locally (type and size, no network)
//! 2. **Upload** it, receiving a `cv_id`
//! 3. **Start analysis**, receiving a `job_id`, then **poll** the job until it
//!    reaches a terminal status
//! 4. **Fetch the report** once the job completed
//!
//! Every failure is normalized into one [`Error`] type with a machine-readable
//! code and a user-facing [`Notice`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use cv_analyzer_client::{AnalysisSession, AnalyzeRequest, Artifact, Config, ReportOutcome, SessionState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let mut session = AnalysisSession::new(&config, SessionState::new())?;
//!
//!     session.select_artifact(Artifact::from_path("resume.pdf").await?)?;
//!     session.upload().await?;
//!     session.start_analysis(AnalyzeRequest::default()).await?;
//!
//!     // Watch progress while waiting
//!     if let Some(mut events) = session.subscribe() {
//!         tokio::spawn(async move {
//!             while let Ok(event) = events.recv().await {
//!                 println!("Event: {:?}", event);
//!             }
//!         });
//!     }
//!
//!     if let ReportOutcome::Ready(report) = session.report().await? {
//!         println!("overall score: {:?}", report.overall_score());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Artifact references and pre-submission validation
pub mod artifact;
/// Typed service endpoints
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Job status polling
pub mod poller;
/// Completion-gated report retrieval
pub mod report;
/// Session credential state
pub mod session;
/// HTTP transport with auth and error normalization
pub mod transport;
/// Wire types and identifiers
pub mod types;
/// Upload -> analyze -> poll -> report orchestration
pub mod workflow;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactSource, ArtifactValidator, validate};
pub use client::{AnalyzerClient, ReportSource, StatusSource};
pub use config::{ApiConfig, Config, PollingConfig, UploadConfig};
pub use error::{
    Error, ErrorDetail, Notice, Result, TransportError, TransportErrorKind, ValidationError,
};
pub use poller::{JobPoller, PollEvent, PollHandle, PollOutcome, PollState, StatusAvailability};
pub use report::{ReportFetcher, ReportOutcome};
pub use session::SessionState;
pub use transport::TransportClient;
pub use types::{
    AnalysisStarted, AnalyzeRequest, CvId, JobId, JobSnapshot, JobStatus, Report, Score,
    TimelineEvent, UploadReceipt,
};
pub use workflow::AnalysisSession;

/// Run the whole flow for one artifact and wait for its report
///
/// Equivalent to `select_artifact`, `upload`, `start_analysis` and `report`
/// on `session`, stopping at the first error.
///
/// # Example
///
/// ```no_run
/// use cv_analyzer_client::{AnalysisSession, AnalyzeRequest, Artifact, Config, SessionState, run_analysis};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut session = AnalysisSession::new(&Config::default(), SessionState::new())?;
///     let artifact = Artifact::from_path("resume.pdf").await?;
///     let outcome = run_analysis(&mut session, artifact, AnalyzeRequest::default()).await?;
///     println!("{:?}", outcome);
///     Ok(())
/// }
/// ```
pub async fn run_analysis(
    session: &mut AnalysisSession,
    artifact: Artifact,
    request: AnalyzeRequest,
) -> Result<ReportOutcome> {
    session.select_artifact(artifact)?;
    session.upload().await?;
    session.start_analysis(request).await?;
    session.report().await
}
