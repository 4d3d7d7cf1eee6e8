use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use shared::{
    domain::ExerciseId,
    error::{FailureKind, RemoteFault},
    protocol::{
        AutosaveRequest, AutosaveResponse, ExecuteRequest, ExecuteResponse, FormatRequest,
        FormatResponse, LintRequest, LintResponse, SubmitRequest, SubmitResponse,
    },
};

/// Anti-forgery token header expected by the exercise service on every call.
pub const CSRF_HEADER: &str = "X-CSRFToken";
/// Bound on how long a single remote call may stay in flight.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status} {message}")]
    Status { status: u16, message: String },
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Transport(_) | ApiError::Status { .. } => FailureKind::Transport,
            ApiError::Decode(_) => FailureKind::Parse,
        }
    }

    pub fn to_fault(&self) -> RemoteFault {
        RemoteFault::new(self.kind(), self.to_string())
    }
}

/// HTTP client for the exercise service.
///
/// Every operation is one POST carrying the anti-forgery token. A non-2xx
/// status or a connection failure surfaces as an `ApiError` (transport
/// level); an envelope with `success: false` is returned as a normal,
/// decoded response for the caller to interpret.
#[derive(Clone)]
pub struct ExerciseApi {
    http: Client,
    base_url: String,
    csrf_token: String,
}

impl ExerciseApi {
    pub fn new(
        base_url: impl Into<String>,
        csrf_token: impl Into<String>,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, csrf_token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        csrf_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            csrf_token: csrf_token.into(),
        })
    }

    pub async fn autosave(
        &self,
        exercise_id: ExerciseId,
        request: &AutosaveRequest,
    ) -> Result<AutosaveResponse, ApiError> {
        self.post_json(exercise_id, "autosave", request).await
    }

    pub async fn lint(
        &self,
        exercise_id: ExerciseId,
        request: &LintRequest,
    ) -> Result<LintResponse, ApiError> {
        self.post_json(exercise_id, "lint", request).await
    }

    pub async fn format(
        &self,
        exercise_id: ExerciseId,
        request: &FormatRequest,
    ) -> Result<FormatResponse, ApiError> {
        self.post_json(exercise_id, "format", request).await
    }

    pub async fn execute(
        &self,
        exercise_id: ExerciseId,
        request: &ExecuteRequest,
    ) -> Result<ExecuteResponse, ApiError> {
        self.post_json(exercise_id, "execute", request).await
    }

    pub async fn submit(
        &self,
        exercise_id: ExerciseId,
        request: &SubmitRequest,
    ) -> Result<SubmitResponse, ApiError> {
        self.post_json(exercise_id, "submit", request).await
    }

    async fn post_json<Req, Resp>(
        &self,
        exercise_id: ExerciseId,
        operation: &str,
        body: &Req,
    ) -> Result<Resp, ApiError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!(
            "{}/exercises/{}/{operation}",
            self.base_url, exercise_id.0
        );
        let response = self
            .http
            .post(url)
            .header(CSRF_HEADER, &self.csrf_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: failure_message(status, &body),
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Extract a human-readable message from a failure body: the service's
/// `message` field when the body is its JSON envelope, the raw body when it
/// is not, the status line when there is no body at all.
fn failure_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
