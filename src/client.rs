//! Typed endpoints of the analysis service
//!
//! [`AnalyzerClient`] covers the four calls this crate drives:
//!
//! | Call | Endpoint |
//! |---|---|
//! | [`upload_artifact`](AnalyzerClient::upload_artifact) | `POST /api/v1/cv/upload` |
//! | [`start_analysis`](AnalyzerClient::start_analysis) | `POST /api/v1/cv/{cv_id}/analyze` |
//! | [`job_status`](AnalyzerClient::job_status) | `GET /api/v1/jobs/{job_id}` |
//! | [`get_report`](AnalyzerClient::get_report) | `GET /api/v1/cv/{cv_id}/report` |
//!
//! Upload and analysis start are deliberately separate: a successful upload
//! never starts an analysis on its own.

use crate::artifact::{Artifact, ArtifactValidator};
use crate::config::Config;
use crate::error::{Error, Result, TransportError, TransportErrorKind, ValidationError};
use crate::session::SessionState;
use crate::transport::{RequestBody, TransportClient};
use crate::types::{AnalysisStarted, AnalyzeRequest, CvId, JobId, JobSnapshot, Report, UploadReceipt};
use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info, warn};

/// Path prefix of every endpoint
pub const API_PREFIX: &str = "/api/v1";

/// Anything that can report a job's current status
///
/// The poller depends on this seam rather than on HTTP directly.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the latest server snapshot of `job_id`
    async fn job_status(&self, job_id: &JobId) -> std::result::Result<JobSnapshot, TransportError>;
}

/// Anything that can retrieve a finished report
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Fetch the report for `cv_id`, mapping "not found" to [`Error::NotReady`]
    async fn report(&self, cv_id: &CvId) -> Result<Report>;
}

/// Client for the CV analysis service
#[derive(Clone, Debug)]
pub struct AnalyzerClient {
    transport: TransportClient,
    validator: ArtifactValidator,
}

impl AnalyzerClient {
    /// Create a client from configuration
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the configuration is invalid.
    pub fn new(config: &Config, session: SessionState) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport: TransportClient::new(&config.api, session)?,
            validator: ArtifactValidator::new(&config.upload),
        })
    }

    /// Create a client around an existing transport
    pub fn with_transport(transport: TransportClient, validator: ArtifactValidator) -> Self {
        Self {
            transport,
            validator,
        }
    }

    /// Underlying transport
    pub fn transport(&self) -> &TransportClient {
        &self.transport
    }

    /// Validator applied before every upload
    pub fn validator(&self) -> &ArtifactValidator {
        &self.validator
    }

    /// Upload a CV
    ///
    /// The artifact is validated first; a [`ValidationError`](crate::ValidationError)
    /// is returned without any network call.
    pub async fn upload_artifact(&self, artifact: &Artifact) -> Result<UploadReceipt> {
        self.validator.validate(artifact)?;

        let bytes = artifact.read_contents().await?;
        // The file may have changed on disk since it was selected
        let actual_size = bytes.len() as u64;
        if actual_size > self.validator.max_size_bytes() {
            warn!(
                filename = artifact.name(),
                selected_size = artifact.size_bytes(),
                actual_size,
                "artifact grew past the size limit after selection"
            );
            return Err(ValidationError::TooLarge {
                size: actual_size,
                max: self.validator.max_size_bytes(),
            }
            .into());
        }

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(artifact.name().to_string())
            .mime_str(artifact.content_type())
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Request,
                    format!("invalid content type: {e}"),
                )
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);

        debug!(
            filename = artifact.name(),
            size = actual_size,
            "uploading CV"
        );

        let receipt: UploadReceipt = self
            .transport
            .send(
                Method::POST,
                &format!("{API_PREFIX}/cv/upload"),
                Some(RequestBody::Multipart(form)),
            )
            .await?;

        info!(
            cv_id = %receipt.cv_id,
            filename = %receipt.filename,
            size = receipt.size_bytes,
            "CV uploaded"
        );
        Ok(receipt)
    }

    /// Start analysing an uploaded CV
    ///
    /// `request.provider` and `request.prompt_version` are forwarded verbatim.
    pub async fn start_analysis(
        &self,
        cv_id: &CvId,
        request: &AnalyzeRequest,
    ) -> Result<AnalysisStarted> {
        let body = serde_json::to_value(request).map_err(|e| {
            TransportError::new(
                TransportErrorKind::Request,
                format!("failed to encode analysis request: {e}"),
            )
        })?;

        let started: AnalysisStarted = self
            .transport
            .send(
                Method::POST,
                &format!("{API_PREFIX}/cv/{}/analyze", encode(cv_id.as_str())),
                Some(RequestBody::Json(body)),
            )
            .await?;

        info!(
            cv_id = %started.cv_id,
            job_id = %started.job_id,
            status = %started.status,
            "analysis started"
        );
        Ok(started)
    }

    /// Fetch a job's current status and timeline
    pub async fn job_status(
        &self,
        job_id: &JobId,
    ) -> std::result::Result<JobSnapshot, TransportError> {
        self.transport
            .send(
                Method::GET,
                &format!("{API_PREFIX}/jobs/{}", encode(job_id.as_str())),
                None,
            )
            .await
    }

    /// Fetch the final report
    ///
    /// A 404 means the report does not exist yet and is returned as
    /// [`Error::NotReady`]; every other failure is [`Error::Transport`].
    pub async fn get_report(&self, cv_id: &CvId) -> Result<Report> {
        let result = self
            .transport
            .send::<Report>(
                Method::GET,
                &format!("{API_PREFIX}/cv/{}/report", encode(cv_id.as_str())),
                None,
            )
            .await;

        match result {
            Ok(report) => {
                info!(cv_id = %cv_id, scores = report.scores.len(), "report retrieved");
                Ok(report)
            }
            Err(e) if e.is_not_found() => {
                debug!(cv_id = %cv_id, "report not ready");
                Err(Error::NotReady {
                    cv_id: cv_id.clone(),
                })
            }
            Err(e) => Err(Error::Transport(e)),
        }
    }
}

#[async_trait]
impl StatusSource for AnalyzerClient {
    async fn job_status(&self, job_id: &JobId) -> std::result::Result<JobSnapshot, TransportError> {
        AnalyzerClient::job_status(self, job_id).await
    }
}

#[async_trait]
impl ReportSource for AnalyzerClient {
    async fn report(&self, cv_id: &CvId) -> Result<Report> {
        self.get_report(cv_id).await
    }
}

fn encode(segment: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(segment)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AnalyzerClient {
        let mut config = Config::default();
        config.api.base_url = server.uri();
        AnalyzerClient::new(&config, SessionState::new()).unwrap()
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/cv/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cv_id": "abc123",
                "filename": "resume.txt",
                "size_bytes": 8,
                "uploaded_at": "2024-03-01T12:00:00.000123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let receipt = client
            .upload_artifact(&Artifact::from_bytes("resume.txt", b"Jane Doe".to_vec()))
            .await
            .unwrap();

        assert_eq!(receipt.cv_id, "abc123");
        assert_eq!(receipt.size_bytes, 8);

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0]
            .headers
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&requests[0].body).to_lowercase();
        assert!(body.contains("name=\"file\""), "missing file field: {body}");
        assert!(body.contains("filename=\"resume.txt\""));
        assert!(body.contains("content-type: text/plain"));
        assert!(body.contains("jane doe"));
    }

    #[tokio::test]
    async fn test_upload_rejects_invalid_artifact_without_network() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let err = client
            .upload_artifact(&Artifact::from_bytes("photo.png", vec![0u8; 16]))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "invalid_type");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rechecks_size_of_file_grown_after_selection() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.pdf");
        std::fs::write(&path, b"%PDF-").unwrap();

        let artifact = Artifact::from_path(&path).await.unwrap();
        assert_eq!(artifact.size_bytes(), 5);

        // Replaced on disk with an oversized file before upload
        std::fs::write(&path, vec![0u8; 11 * 1024 * 1024]).unwrap();

        let err = client.upload_artifact(&artifact).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::TooLarge { size, max })
                if size == 11 * 1024 * 1024 && max == 10 * 1024 * 1024
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_analysis_passes_hints_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/cv/abc123/analyze"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"provider": "anthropic", "prompt_version": "v2-beta"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "job_id": "job789",
                "cv_id": "abc123",
                "status": "pending",
                "created_at": "2024-03-01T12:00:00"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = AnalyzeRequest {
            provider: Some("anthropic".into()),
            prompt_version: Some("v2-beta".into()),
        };
        let started = client
            .start_analysis(&CvId::from("abc123"), &request)
            .await
            .unwrap();

        assert_eq!(started.job_id, "job789");
        assert_eq!(started.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_start_analysis_without_hints_sends_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/cv/abc123/analyze"))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "job_id": "job789",
                "cv_id": "abc123",
                "status": "pending",
                "created_at": "2024-03-01T12:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .start_analysis(&CvId::from("abc123"), &AnalyzeRequest::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_analysis_missing_cv_surfaces_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "CV not found"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .start_analysis(&CvId::from("gone"), &AnalyzeRequest::default())
            .await
            .unwrap_err();

        match &err {
            Error::Transport(t) => {
                assert_eq!(t.status, Some(404));
                assert_eq!(t.user_message(), "CV not found");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ids_are_percent_encoded_in_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/jobs/job%2F1%20x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "job_id": "job/1 x",
                "cv_id": "abc",
                "status": "processing",
                "created_at": "2024-03-01T12:00:00",
                "updated_at": "2024-03-01T12:00:01",
                "timeline": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let snapshot = client.job_status(&JobId::from("job/1 x")).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_get_report_not_found_is_not_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/cv/abc123/report"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Report not found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get_report(&CvId::from("abc123")).await.unwrap_err();
        assert!(err.is_not_ready(), "expected NotReady, got {err:?}");
        assert_eq!(
            err.notice(),
            crate::error::Notice::Waiting(crate::error::REPORT_NOT_READY_MESSAGE.into())
        );
    }

    #[tokio::test]
    async fn test_get_report_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "boom"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get_report(&CvId::from("abc123")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref t) if t.status == Some(500)));
    }

    #[tokio::test]
    async fn test_get_report_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/cv/abc123/report"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "scores": [{"category": "overall", "score": 72.5, "description": "Good"}],
                "skills": ["Rust", "PostgreSQL"],
                "gaps": ["Kubernetes"],
                "improvement_plan": "Highlight production incidents you resolved."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let report = client.get_report(&CvId::from("abc123")).await.unwrap();
        assert_eq!(report.scores[0].score, 72.5);
        assert_eq!(report.skills, vec!["Rust", "PostgreSQL"]);
    }
}
