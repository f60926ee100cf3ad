//! HTTP transport for the analysis service
//!
//! [`TransportClient`] wraps one configured `reqwest::Client`. Every request
//! passes through the same two steps:
//! - **authorize**: attach `Authorization: Bearer <token>` when the
//!   [`SessionState`] holds a credential (anonymous otherwise)
//! - **normalize**: turn any failure (timeout, connection, non-2xx, bad body)
//!   into a [`TransportError`], pulling the server's `detail` field when present
//!
//! Successful responses are decoded into the caller's type untouched.

use crate::config::ApiConfig;
use crate::error::{Error, Result, TransportError, TransportErrorKind};
use crate::session::SessionState;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Request payload
#[derive(Debug)]
pub enum RequestBody {
    /// JSON body (`Content-Type: application/json`)
    Json(serde_json::Value),
    /// Multipart form body (file uploads)
    Multipart(reqwest::multipart::Form),
}

/// Configured HTTP client shared by every component
#[derive(Clone, Debug)]
pub struct TransportClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionState,
    timeout: Duration,
}

impl TransportClient {
    /// Create a transport for the configured service
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ApiConfig, session: SessionState) -> Result<Self> {
        let parsed = Url::parse(&config.base_url)
            .map_err(|e| Error::config("api.base_url", format!("invalid base URL: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(Error::config(
                "api.base_url",
                format!("{} cannot be used as a base URL", config.base_url),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::config("api", format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            timeout: config.timeout,
        })
    }

    /// Session whose credential is attached to requests
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `path` against the base URL, keeping any base path prefix
    pub fn url(&self, path: &str) -> std::result::Result<Url, TransportError> {
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| {
            TransportError::new(
                TransportErrorKind::Request,
                format!("invalid request URL {joined}: {e}"),
            )
        })
    }

    /// Send a request and decode a JSON response
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
    ) -> std::result::Result<T, TransportError> {
        let response = self.execute(method.clone(), path, body).await?;

        response.json::<T>().await.map_err(|e| {
            let err = if e.is_timeout() {
                self.normalize_send_error(&e)
            } else {
                TransportError::new(
                    TransportErrorKind::Decode,
                    format!("invalid response body: {e}"),
                )
            };
            warn!(method = %method, path, error = %err, "failed to decode response");
            err
        })
    }

    /// Send a request and return the raw successful response
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
    ) -> std::result::Result<Response, TransportError> {
        let url = self.url(path)?;
        let mut request = self.authorize(self.http.request(method.clone(), url));

        request = match body {
            Some(RequestBody::Json(value)) => request.json(&value),
            Some(RequestBody::Multipart(form)) => request.multipart(form),
            None => request,
        };

        debug!(method = %method, path, "sending request");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = self.normalize_send_error(&e);
                warn!(method = %method, path, kind = ?err.kind, error = %err, "request failed");
                return Err(err);
            }
        };

        let status = response.status();
        debug!(method = %method, path, status = status.as_u16(), "received response");

        if status.is_success() {
            return Ok(response);
        }

        let err = normalize_failure(response).await;
        warn!(method = %method, path, status = status.as_u16(), error = %err, "server returned error");
        Err(err)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn normalize_send_error(&self, error: &reqwest::Error) -> TransportError {
        let mut err = TransportError::from_reqwest(error);
        if err.is_timeout() {
            err.message = format!("timeout of {}ms exceeded", self.timeout.as_millis());
        }
        err
    }
}

async fn normalize_failure(response: Response) -> TransportError {
    let status = response.status().as_u16();
    let message = format!("Request failed with status code {status}");
    let detail = match response.bytes().await {
        Ok(body) => extract_detail(&body),
        Err(e) => {
            debug!(status, error = %e, "could not read error body");
            None
        }
    };
    TransportError::from_status(status, message, detail)
}

/// Pull the `detail` field out of an error body
///
/// String details are returned as-is; structured details (e.g. a validation
/// error list) are rendered as compact JSON.
pub(crate) fn extract_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
