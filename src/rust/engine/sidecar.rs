use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{multipart, Client, StatusCode};
use serde_json::Value;

use super::{AcousticEngine, EngineError, InvocationMode};
use crate::RawModelOutput;

const CLASSIFY_PATH: &str = "/classify";
const STAGED_FILE_NAME: &str = "audio.wav";

/// An acoustic model served by a separate process over HTTP.
///
/// The staged clip is posted as multipart field `file` to
/// `{base_url}/classify` together with `logprobs=true|false`. The reply body is
/// the model's raw return value as JSON and is decoded with
/// [`RawModelOutput::from_json`]. A 422 or 501 reply to a `logprobs=true`
/// request means the model build cannot produce scores.
#[derive(Debug, Clone)]
pub struct SidecarEngine {
    client: Client,
    base_url: String,
}

impl SidecarEngine {
    /// With `timeout` unset a request waits as long as the sidecar takes.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, EngineError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| EngineError::Sidecar(format!("Failed to build HTTP client: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Using inference sidecar at {}", base_url);
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AcousticEngine for SidecarEngine {
    fn name(&self) -> &str {
        "sidecar"
    }

    async fn run(&self, audio: &Path, mode: InvocationMode) -> Result<RawModelOutput, EngineError> {
        let bytes = tokio::fs::read(audio).await?;
        let part = multipart::Part::bytes(bytes)
            .file_name(STAGED_FILE_NAME)
            .mime_str("audio/wav")
            .map_err(|e| EngineError::Sidecar(format!("Failed to create multipart: {}", e)))?;
        let logprobs = mode == InvocationMode::Probabilities;
        let form = multipart::Form::new()
            .part("file", part)
            .text("logprobs", logprobs.to_string());

        let url = format!("{}{}", self.base_url, CLASSIFY_PATH);
        debug!("Posting {:?} to {} (logprobs={})", audio, url, logprobs);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| EngineError::Sidecar(format!("Request failed: {}", e)))?;

        let status = response.status();
        if logprobs
            && (status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::NOT_IMPLEMENTED)
        {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::CapabilityMismatch {
                mode,
                reason: format!("sidecar returned {}: {}", status, body),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Sidecar(format!("Sidecar returned {}: {}", status, body)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| EngineError::Sidecar(format!("Failed to parse response: {}", e)))?;
        Ok(RawModelOutput::from_json(value))
    }
}
