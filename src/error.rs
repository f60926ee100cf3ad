//! Error types for cv-analyzer-client
//!
//! The taxonomy has three layers:
//! - [`ValidationError`] - local, pre-flight artifact checks that never touch the network
//! - [`TransportError`] - the single normalized shape for every network, timeout,
//!   and server-reported failure
//! - [`Error`] - the crate-level error, which also carries the expected
//!   "report not ready" condition and workflow precondition failures
//!
//! Every [`Error`] maps to a machine-readable code ([`Error::error_code`]) and a
//! user-facing [`Notice`] so presentation layers never branch on transport details.

use crate::types::CvId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for cv-analyzer-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cv-analyzer-client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.base_url")
        key: Option<String>,
    },

    /// Artifact rejected before submission
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Normalized network or server failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The report for this CV does not exist yet
    ///
    /// This is an expected condition while analysis is still running, not a failure.
    #[error("report for CV {cv_id} is not ready yet")]
    NotReady {
        /// The CV whose report was requested
        cv_id: CvId,
    },

    /// Upload requested without a selected artifact
    #[error("no artifact selected")]
    NoArtifact,

    /// Analysis or report requested before an upload succeeded
    #[error("no CV uploaded in this session")]
    NoCvId,

    /// Failed to read a file-backed artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reason an artifact failed pre-submission validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Extension is not one of the accepted document types
    #[error("file type {extension:?} is not allowed")]
    InvalidType {
        /// The lowercased extension that was rejected (empty if the file has none)
        extension: String,
    },

    /// File exceeds the maximum upload size
    #[error("file is {size} bytes, maximum is {max} bytes")]
    TooLarge {
        /// Size of the rejected artifact in bytes
        size: u64,
        /// Configured maximum size in bytes
        max: u64,
    },
}

impl ValidationError {
    /// Machine-readable reason (`invalid_type` or `too_large`)
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::InvalidType { .. } => "invalid_type",
            ValidationError::TooLarge { .. } => "too_large",
        }
    }

    /// Actionable message shown inline next to the file picker
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::InvalidType { .. } => {
                "Invalid file type. Please upload PDF, DOCX, or TXT.".to_string()
            }
            ValidationError::TooLarge { max, .. } => {
                format!("File too large. Maximum size is {}.", format_limit(*max))
            }
        }
    }
}

/// Render a byte limit in the largest unit that keeps it non-zero
fn format_limit(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;

    if bytes >= MIB {
        if bytes % MIB == 0 {
            format!("{}MB", bytes / MIB)
        } else {
            format!("{:.1}MB", bytes as f64 / MIB as f64)
        }
    } else if bytes >= KIB {
        if bytes % KIB == 0 {
            format!("{}KB", bytes / KIB)
        } else {
            format!("{:.1}KB", bytes as f64 / KIB as f64)
        }
    } else {
        format!("{bytes} bytes")
    }
}

/// Classification of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The request exceeded the configured per-request timeout
    Timeout,
    /// The connection could not be established
    Connect,
    /// The server answered with a non-2xx status
    Status,
    /// The response body could not be decoded into the expected shape
    Decode,
    /// Any other failure building or sending the request
    Request,
}

/// Normalized transport failure
///
/// Callers inspect this one shape instead of `reqwest` error types. The
/// user-facing message prefers the server's `detail` field over the
/// transport-level text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// What kind of failure occurred
    pub kind: TransportErrorKind,
    /// Transport-level message (from `reqwest` or a status line)
    pub message: String,
    /// The `detail` field of the server's error body, if any
    pub detail: Option<String>,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
}

impl TransportError {
    /// Create a transport error of the given kind
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            status: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// Create an error for a non-2xx response
    pub fn from_status(status: u16, message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            kind: TransportErrorKind::Status,
            message: message.into(),
            detail,
            status: Some(status),
        }
    }

    /// Normalize a `reqwest` failure
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_decode() {
            TransportErrorKind::Decode
        } else if error.is_status() {
            TransportErrorKind::Status
        } else {
            TransportErrorKind::Request
        };

        Self {
            kind,
            message: error.to_string(),
            detail: None,
            status: error.status().map(|s| s.as_u16()),
        }
    }

    /// True when the request exceeded its timeout
    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }

    /// True when the server answered 404
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    /// Message for display: server detail first, then transport text
    pub fn user_message(&self) -> &str {
        match self.detail.as_deref() {
            Some(detail) if !detail.is_empty() => detail,
            _ => &self.message,
        }
    }

    /// Like [`user_message`](Self::user_message), falling back to `fallback` when both are empty
    pub fn user_message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        let msg = self.user_message();
        if msg.is_empty() { fallback } else { msg }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.user_message()),
            None => write!(f, "{}", self.user_message()),
        }
    }
}

impl std::error::Error for TransportError {}

/// User-facing treatment of an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notice {
    /// Inline, actionable message; the form stays usable
    Inline(String),
    /// Error banner built from the normalized error
    Banner(String),
    /// Non-destructive "please wait" message
    Waiting(String),
}

impl Notice {
    /// The message text regardless of treatment
    pub fn message(&self) -> &str {
        match self {
            Notice::Inline(m) | Notice::Banner(m) | Notice::Waiting(m) => m,
        }
    }
}

/// Generic banner text for a failed request without server detail
pub const REQUEST_FAILED_MESSAGE: &str = "Request failed. Please try again.";

/// Banner text for a failed upload without server detail
pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Please try again.";

/// Message shown while a report is not yet available
pub const REPORT_NOT_READY_MESSAGE: &str =
    "Report not available yet. Please wait for analysis to complete.";

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(e) => e.reason(),
            Error::Transport(e) => match e.kind {
                TransportErrorKind::Timeout => "timeout",
                TransportErrorKind::Connect => "connect_error",
                TransportErrorKind::Status => "server_error",
                TransportErrorKind::Decode => "decode_error",
                TransportErrorKind::Request => "request_error",
            },
            Error::NotReady { .. } => "not_ready",
            Error::NoArtifact => "no_artifact",
            Error::NoCvId => "no_cv_id",
            Error::Io(_) => "io_error",
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport(e) => e.status,
            _ => None,
        }
    }

    /// True for the expected "report not ready" condition
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Error::NotReady { .. })
    }

    /// How this error should be presented to the user
    pub fn notice(&self) -> Notice {
        self.notice_or(REQUEST_FAILED_MESSAGE)
    }

    /// Like [`notice`](Self::notice), with `fallback` as the banner text when a
    /// transport failure carries no message of its own
    pub fn notice_or(&self, fallback: &str) -> Notice {
        match self {
            Error::Validation(e) => Notice::Inline(e.user_message()),
            Error::NoArtifact => Notice::Inline("Please select a CV file to upload.".to_string()),
            Error::NoCvId => Notice::Inline("Upload a CV before starting analysis.".to_string()),
            Error::NotReady { .. } => Notice::Waiting(REPORT_NOT_READY_MESSAGE.to_string()),
            Error::Transport(e) => {
                Notice::Banner(e.user_message_or(fallback).to_string())
            }
            Error::Config { .. } | Error::Io(_) => Notice::Banner(self.to_string()),
        }
    }
}

/// Serializable error description for presentation layers
///
/// # Example JSON
///
/// ```json
/// {
///   "code": "server_error",
///   "message": "File type not allowed",
///   "status": 400
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "invalid_type", "timeout")
    pub code: String,

    /// Human-readable message, preferring server-provided detail
    pub message: String,

    /// HTTP status when the error came from a server response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&Error> for ErrorDetail {
    fn from(error: &Error) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.notice().message().to_string(),
            status: error.status(),
        }
    }
}
