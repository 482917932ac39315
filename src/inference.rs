use crate::intake::ValidatedFile;
use crate::record::InferenceResult;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Anything that can classify a validated upload. The HTTP client below
/// is the production implementation; tests substitute a canned double.
pub trait InferenceService {
    fn classify(
        &self,
        file: &ValidatedFile,
    ) -> impl Future<Output = Result<InferenceResult, SubmissionError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Transport(String),
    #[error("inference request timed out")]
    Timeout,
    // The server-supplied error message, verbatim.
    #[error("{0}")]
    Service(String),
    #[error("malformed inference response: {0}")]
    MalformedResponse(String),
}

/// HTTP client for the remote inference endpoint. Constructed once at
/// startup and passed by reference; one submission means exactly one
/// request, with no retry.
pub struct InferenceClient {
    client: Client,
    endpoint: String,
}

impl InferenceClient {
    pub fn new(endpoint: &str, timeout_seconds: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("pneumoscan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    async fn submit(&self, file: &ValidatedFile) -> Result<InferenceResult, SubmissionError> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| SubmissionError::Transport(format!("could not read upload: {e}")))?;

        let file_name = Path::new(&file.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&file.media_type)
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        log::debug!(
            "submitting {} ({} bytes) to {}",
            file.path,
            file.size_bytes,
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SubmissionError::Timeout
                } else {
                    SubmissionError::Transport(format!(
                        "could not reach the inference service: {e}"
                    ))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        interpret_response(status, &body)
    }
}

impl InferenceService for InferenceClient {
    async fn classify(&self, file: &ValidatedFile) -> Result<InferenceResult, SubmissionError> {
        self.submit(file).await
    }
}

/// Turn a raw endpoint response into a typed outcome. The remote service
/// is not trusted: both fields must be present, well-typed, and in range
/// before a result is produced.
pub fn interpret_response(
    status: StatusCode,
    body: &str,
) -> Result<InferenceResult, SubmissionError> {
    if !status.is_success() {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(message) = value.get("error").and_then(|m| m.as_str()) {
                return Err(SubmissionError::Service(message.to_string()));
            }
        }
        return Err(SubmissionError::Transport(format!(
            "inference service returned HTTP {}",
            status.as_u16()
        )));
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| SubmissionError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let predicted_label = value
        .get("predicted_label")
        .and_then(|v| v.as_str())
        .filter(|label| !label.is_empty())
        .ok_or_else(|| {
            SubmissionError::MalformedResponse("missing or empty predicted_label".to_string())
        })?;

    let confidence_score = value
        .get("confidence_score")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| {
            SubmissionError::MalformedResponse("missing or non-numeric confidence_score".to_string())
        })?;

    if !(0.0..=1.0).contains(&confidence_score) {
        return Err(SubmissionError::MalformedResponse(format!(
            "confidence_score {confidence_score} outside [0, 1]"
        )));
    }

    Ok(InferenceResult {
        predicted_label: predicted_label.to_string(),
        confidence_score,
    })
}
