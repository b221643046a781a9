use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT_SECS: u64 = 20;

/// InsightError
///
/// Failures from the generative-language API. None of these reach the client:
/// the assistant service falls back to a local heuristic instead.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("generative API key is not configured")]
    MissingApiKey,
    #[error("provider returned status {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned no text")]
    EmptyAnswer,
    #[error("simulated failure")]
    Simulated,
}

/// InsightService Contract
///
/// Turns a prompt into free-text answer.
#[async_trait]
pub trait InsightService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError>;
}

/// InsightState
///
/// Shared handle to the answer generator.
pub type InsightState = Arc<dyn InsightService>;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// GeminiClient
///
/// `InsightService` backed by the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl InsightService for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        let key = self.api_key.as_deref().ok_or(InsightError::MissingApiKey)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InsightError::Status(status));
        }

        response
            .json::<GenerateResponse>()
            .await?
            .into_text()
            .ok_or(InsightError::EmptyAnswer)
    }
}

/// MockInsightService
///
/// Returns a fixed answer (or fails) and records the last prompt it saw.
#[derive(Default)]
pub struct MockInsightService {
    pub answer: Option<String>,
    last_prompt: Mutex<Option<String>>,
}

impl MockInsightService {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl InsightService for MockInsightService {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }
        self.answer.clone().ok_or(InsightError::Simulated)
    }
}
