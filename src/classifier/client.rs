use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{ApiKey, ModelConfig};
use crate::error::BackendError;
use crate::models::ClassificationRequest;

/// A hosted model that turns a prompt into raw reply text.
///
/// Implementations classify their own failures so the retry loop never has
/// to inspect transport details.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Model identifier recorded in reports.
    fn model_name(&self) -> &str;

    async fn generate(&self, request: &ClassificationRequest) -> Result<String, BackendError>;
}

/// Google Gemini `generateContent` over HTTPS.
pub struct GeminiBackend {
    client: Client,
    endpoint: String,
    model: String,
    api_key: ApiKey,
}

impl GeminiBackend {
    pub fn new(config: &ModelConfig, api_key: ApiKey) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("sensitivity-checkr/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.name.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ClassificationRequest) -> Result<String, BackendError> {
        let body = request_body(request);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &api_error_message(&detail)));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Transient(format!("unreadable response body: {}", e)))?;

        let text = extract_text(&data)?;
        debug!(chars = text.len(), preview = %preview(&text), "model replied");
        Ok(text)
    }
}

/// JSON body for `generateContent`.
pub fn request_body(request: &ClassificationRequest) -> Value {
    let params = &request.generation_params;
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        "generationConfig": {
            "temperature": params.temperature,
            "topP": params.top_p,
            "topK": params.top_k,
            "maxOutputTokens": params.max_output_tokens,
        }
    })
}

/// Map an HTTP status onto retryable vs terminal.
pub fn classify_status(status: StatusCode, detail: &str) -> BackendError {
    let message = if detail.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, detail)
    };

    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        BackendError::Transient(message)
    } else {
        BackendError::Terminal(message)
    }
}

fn classify_transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        BackendError::Transient(format!("request failed: {}", err))
    } else {
        BackendError::Terminal(format!("request failed: {}", err))
    }
}

/// Pull `error.message` out of a Google API error body, if present.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| preview(body))
}

/// Concatenate the text parts of the first candidate.
///
/// No candidates means the prompt was refused (usually a safety block);
/// retrying the same prompt will not help.
pub fn extract_text(data: &Value) -> Result<String, BackendError> {
    let candidate = data
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());

    let Some(candidate) = candidate else {
        let reason = data
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(|r| r.as_str())
            .unwrap_or("no candidates returned");
        return Err(BackendError::Terminal(format!("model returned no answer: {}", reason)));
    };

    let text: String = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(|r| r.as_str())
            .unwrap_or("empty answer");
        return Err(BackendError::Terminal(format!("model returned no text: {}", reason)));
    }
    Ok(text)
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}
