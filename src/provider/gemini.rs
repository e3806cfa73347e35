// src/provider/gemini.rs

use super::{CallResult, GenerateRequest, ProviderAdapter};
use crate::classifier::ResponseClassifier;
use crate::config::ProviderConfig;
use crate::core::Outcome;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl<'a> GenerateContentBody<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        let generation_config = (request.temperature.is_some() || request.max_output_tokens.is_some())
            .then_some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            });

        Self {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            system_instruction: request.system_instruction.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config,
        }
    }
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Adapter for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiAdapter {
    client: Client,
    base_url: String,
    model: String,
    request_timeout: Duration,
    probe_timeout: Duration,
    classifier: ResponseClassifier,
}

impl GeminiAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(AppError::from)?;
        info!(base_url = %config.base_url, model = %config.model, "Provider HTTP client created");

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            classifier: ResponseClassifier::default(),
        })
    }

    pub fn with_classifier(mut self, classifier: ResponseClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    fn probe_url(&self) -> String {
        format!("{}/v1beta/models?pageSize=1", self.base_url)
    }

    /// Sends the request and reads the whole body within `timeout`.
    /// Returns `None` on timeout or transport error.
    async fn send(
        &self,
        request: RequestBuilder,
        secret: &Secret<String>,
        timeout: Duration,
    ) -> Option<(reqwest::StatusCode, String)> {
        let call = async {
            let response = request
                .header(API_KEY_HEADER, secret.expose_secret())
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                warn!(error = %e, "Provider call failed before a response was received");
                None
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Provider call timed out");
                None
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    async fn generate(&self, secret: &Secret<String>, request: &GenerateRequest) -> CallResult {
        let body = GenerateContentBody::from_request(request);
        let builder = self.client.post(self.generate_url()).json(&body);

        let Some((status, body)) = self.send(builder, secret, self.request_timeout).await else {
            return CallResult::failed(Outcome::OtherFailure, None);
        };

        let outcome = self.classifier.classify(status, &body);
        if !outcome.is_success() {
            return CallResult::failed(outcome, Some(status.as_u16()));
        }

        let text = match serde_json::from_str::<GenerateContentResponse>(&body) {
            Ok(parsed) => parsed.text(),
            Err(e) => {
                warn!(error = %e, "Provider returned an unparseable success body");
                None
            }
        };
        debug!(status = status.as_u16(), has_text = text.is_some(), "Generation call completed");

        CallResult {
            outcome,
            text,
            status: Some(status.as_u16()),
        }
    }

    async fn probe(&self, secret: &Secret<String>) -> Outcome {
        let builder = self.client.get(self.probe_url());
        match self.send(builder, secret, self.probe_timeout).await {
            Some((status, body)) => self.classifier.classify(status, &body),
            None => Outcome::OtherFailure,
        }
    }
}
