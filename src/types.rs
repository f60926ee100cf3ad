//! Core types for cv-analyzer-client
//!
//! Wire shapes exchanged with the analysis service, plus the identifier
//! newtypes and the open [`JobStatus`] enumeration.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Server-assigned identifier for an uploaded CV
    CvId
);

string_id!(
    /// Server-assigned identifier for an analysis job
    JobId
);

/// Job status as reported by the server
///
/// The server owns the vocabulary. Only `completed` and `failed` are terminal;
/// any value this client does not recognise is kept verbatim in
/// [`JobStatus::Other`] and treated as still running.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// Queued, not yet picked up by a worker
    Pending,
    /// A worker is analysing the CV
    Processing,
    /// Analysis finished; the report can be fetched
    Completed,
    /// Analysis failed; see the job's error message
    Failed,
    /// A status value this client does not know
    Other(String),
}

impl JobStatus {
    /// The wire representation
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Other(s) => s,
        }
    }

    /// True for `completed` and `failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Other(s),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        JobStatus::from(s.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response to a CV upload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Identifier for all subsequent calls
    pub cv_id: CvId,
    /// Original filename as stored by the server
    pub filename: String,
    /// Stored size in bytes
    pub size_bytes: u64,
    /// Upload timestamp
    #[serde(with = "timestamp_serde")]
    pub uploaded_at: DateTime<Utc>,
}

/// Body of an analysis request
///
/// Both fields are opaque hints forwarded to the server; absent values are
/// omitted from the JSON body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// AI provider to use (server default when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Prompt template version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<String>,
}

/// Response to an analysis trigger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStarted {
    /// Job to poll
    pub job_id: JobId,
    /// CV being analysed
    pub cv_id: CvId,
    /// Initial status (normally `pending`)
    pub status: JobStatus,
    /// Job creation timestamp
    #[serde(with = "timestamp_serde")]
    pub created_at: DateTime<Utc>,
}

/// One entry in a job's timeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// When the event happened
    #[serde(with = "timestamp_serde")]
    pub timestamp: DateTime<Utc>,
    /// Event name (e.g., "job_created", "parsing_started")
    pub event: String,
    /// Human-readable message
    pub message: String,
    /// Arbitrary structured data attached by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Server snapshot of a job, as returned by the status endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job identifier
    pub job_id: JobId,
    /// CV identifier
    pub cv_id: CvId,
    /// Current status
    pub status: JobStatus,
    /// Job creation timestamp
    #[serde(with = "timestamp_serde")]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    #[serde(with = "timestamp_serde")]
    pub updated_at: DateTime<Utc>,
    /// Server-ordered timeline
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    /// Error message if the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    /// True once the job reached `completed` or `failed`
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Most recent timeline entry
    pub fn latest_event(&self) -> Option<&TimelineEvent> {
        self.timeline.last()
    }
}

/// Score for one analysis category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Category name (e.g., "experience", "ats_compatibility")
    pub category: String,
    /// Score value, 0-100
    pub score: f64,
    /// Explanation of the score
    #[serde(default)]
    pub description: String,
}

/// Final analysis report for a CV
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// CV identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_id: Option<CvId>,
    /// Job that produced the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    /// AI provider used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Prompt template version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<String>,
    /// Category scores
    #[serde(default)]
    pub scores: Vec<Score>,
    /// Analysis summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Detected skills
    #[serde(default)]
    pub skills: Vec<String>,
    /// Identified gaps
    #[serde(default)]
    pub gaps: Vec<String>,
    /// Detected seniority level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority_level: Option<String>,
    /// ATS compatibility issues
    #[serde(default)]
    pub ats_issues: Vec<String>,
    /// Improvement recommendations
    #[serde(default)]
    pub improvement_plan: String,
    /// Raw analysis JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<serde_json::Value>,
    /// Report generation timestamp
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_timestamp_serde"
    )]
    pub generated_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Mean of all category scores, or `None` when there are none
    pub fn overall_score(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        let total: f64 = self.scores.iter().map(|s| s.score).sum();
        Some(total / self.scores.len() as f64)
    }

    /// Score for a category, if present
    pub fn score_for(&self, category: &str) -> Option<&Score> {
        self.scores.iter().find(|s| s.category == category)
    }
}

/// Parse a server timestamp
///
/// Accepts RFC 3339 and naive ISO-8601 (no offset), which is read as UTC.
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp {raw:?}: {e}"))
}

mod timestamp_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

mod optional_timestamp_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ts {
            Some(ts) => serializer.serialize_some(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| super::parse_timestamp(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
