// src/service.rs

use crate::config::GenerationConfig;
use crate::error::{AppError, Result};
use crate::key_manager::KeyPool;
use crate::provider::{GenerateRequest, ProviderAdapter};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const CV_ASSISTANT_INSTRUCTION: &str = "You are a concise, friendly assistant that helps people write and improve their CV. \
Answer in plain text.";

const SKILL_DESCRIPTION_INSTRUCTION: &str = "You write short, professional skill descriptions for a CV. \
Reply with two or three sentences and no headings.";

/// Consumer side of the pool: acquire, call, report.
///
/// A failed call is reported and retried with a different credential, up to
/// `max_attempts` distinct credentials. When the pool has nothing eligible the
/// caller gets [`AppError::Unavailable`].
#[derive(Clone)]
pub struct GenerationService {
    pool: Arc<KeyPool>,
    adapter: Arc<dyn ProviderAdapter>,
    max_attempts: u32,
}

impl GenerationService {
    pub fn new(pool: Arc<KeyPool>, adapter: Arc<dyn ProviderAdapter>, config: &GenerationConfig) -> Self {
        Self {
            pool,
            adapter,
            max_attempts: config.max_attempts.max(1),
        }
    }

    #[instrument(skip_all, fields(prompt_len = request.prompt.len()))]
    pub async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let mut tried = HashSet::new();

        for attempt in 1..=self.max_attempts {
            let Some(id) = self.pool.acquire_excluding(&tried).await? else {
                warn!(attempt, "No credential available for generation");
                return Err(AppError::Unavailable);
            };
            let secret = self
                .pool
                .secret(&id)
                .ok_or_else(|| AppError::internal(format!("no secret bound for credential '{id}'")))?;

            let result = self.adapter.generate(&secret, request).await;
            self.pool.report(&id, result.outcome).await?;

            if result.outcome.is_success() {
                info!(credential.id = %id, attempt, "Generation succeeded");
                return result.text.ok_or_else(|| AppError::HttpClient {
                    message: "Provider returned no text".to_string(),
                    status_code: result.status,
                });
            }

            warn!(
                credential.id = %id,
                attempt,
                outcome = %result.outcome,
                status = ?result.status,
                "Generation attempt failed, trying another credential"
            );
            tried.insert(id);
        }

        Err(AppError::Unavailable)
    }

    /// Chat-assistant turn.
    pub async fn chat(&self, message: &str) -> Result<String> {
        let request = GenerateRequest::new(message)
            .with_system_instruction(CV_ASSISTANT_INSTRUCTION)
            .with_temperature(0.7);
        self.generate(&request).await
    }

    /// Short CV description of a skill, optionally at a stated level.
    pub async fn describe_skill(&self, skill: &str, level: Option<&str>) -> Result<String> {
        let prompt = match level {
            Some(level) => format!("Describe the skill \"{skill}\" at {level} level for a CV."),
            None => format!("Describe the skill \"{skill}\" for a CV."),
        };
        let request = GenerateRequest::new(prompt)
            .with_system_instruction(SKILL_DESCRIPTION_INSTRUCTION)
            .with_temperature(0.4)
            .with_max_output_tokens(256);
        self.generate(&request).await
    }
}
