//! Common test utilities for cv-analyzer-client integration tests
//!
//! Stands up a wiremock server speaking the analysis service's API and
//! provides helpers for waiting on poller events.

#![allow(dead_code)]

use cv_analyzer_client::{Config, PollEvent};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CV_ID: &str = "abc123";
pub const JOB_ID: &str = "job789";
pub const MIB: usize = 1024 * 1024;

/// Config pointing at `server` with a short poll interval
pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.polling.interval = Duration::from_millis(50);
    config
}

/// Timeline entries recorded by the service as the job advances
fn timeline_for(status: &str) -> Vec<Value> {
    let steps: &[(&str, &str)] = match status {
        "pending" => &[("job_created", "Analysis job created")],
        "processing" => &[
            ("job_created", "Analysis job created"),
            ("parsing_started", "Parsing CV document"),
        ],
        _ => &[
            ("job_created", "Analysis job created"),
            ("parsing_started", "Parsing CV document"),
            ("analysis_completed", "Analysis finished"),
        ],
    };
    steps
        .iter()
        .enumerate()
        .map(|(i, (event, message))| {
            json!({
                "timestamp": format!("2024-03-01T12:00:0{i}.123456"),
                "event": event,
                "message": message,
            })
        })
        .collect()
}

/// Body of `GET /api/v1/jobs/{job_id}`
pub fn status_body(status: &str, error: Option<&str>) -> Value {
    json!({
        "job_id": JOB_ID,
        "cv_id": CV_ID,
        "status": status,
        "created_at": "2024-03-01T12:00:00.000001",
        "updated_at": "2024-03-01T12:00:05.000001",
        "timeline": timeline_for(status),
        "error": error,
    })
}

pub async fn mount_upload(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/cv/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cv_id": CV_ID,
            "filename": "resume.pdf",
            "size_bytes": 2 * MIB,
            "uploaded_at": "2024-03-01T11:59:58.250000"
        })))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_analyze(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/cv/{CV_ID}/analyze")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": JOB_ID,
            "cv_id": CV_ID,
            "status": "pending",
            "created_at": "2024-03-01T12:00:00.000001"
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Serve `statuses` in order, one request each, repeating the last forever
pub async fn mount_status_sequence(server: &MockServer, statuses: &[&str]) {
    let Some((last, first)) = statuses.split_last() else {
        return;
    };
    for status in first {
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/jobs/{JOB_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(status_body(status, None)))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
    let error = (*last == "failed").then_some("AI provider error");
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/jobs/{JOB_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(last, error)))
        .mount(server)
        .await;
}

pub fn report_body() -> Value {
    json!({
        "cv_id": CV_ID,
        "job_id": JOB_ID,
        "provider": "openai",
        "prompt_version": "v1",
        "scores": [
            {"category": "experience", "score": 85.0, "description": "Solid backend track record"},
            {"category": "skills", "score": 78.0, "description": "Broad but shallow frontend"},
            {"category": "ats_compatibility", "score": 90.0, "description": "Clean structure"}
        ],
        "summary": "Experienced backend engineer",
        "skills": ["Rust", "PostgreSQL", "Kubernetes"],
        "gaps": ["No public speaking"],
        "seniority_level": "senior",
        "ats_issues": [],
        "improvement_plan": "Quantify impact in recent roles",
        "generated_at": "2024-03-01T12:00:06.000001"
    })
}

/// Mount the report endpoint, expecting exactly `times` fetches
pub async fn mount_report(server: &MockServer, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/cv/{CV_ID}/report")))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_body()))
        .expect(times)
        .mount(server)
        .await;
}

/// Number of status requests the server received
pub async fn status_request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with("/api/v1/jobs/"))
        .count()
}

/// Collect events until `done` matches one or `timeout` elapses
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<PollEvent>,
    timeout: Duration,
    done: F,
) -> Vec<PollEvent>
where
    F: Fn(&PollEvent) -> bool,
{
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let finished = done(&event);
            seen.push(event);
            if finished {
                break;
            }
        }
    })
    .await;
    seen
}

/// Drain everything already buffered
pub fn drain(events: &mut broadcast::Receiver<PollEvent>) -> Vec<PollEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
