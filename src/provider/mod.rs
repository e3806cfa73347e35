// src/provider/mod.rs

pub mod gemini;

pub use gemini::GeminiAdapter;

use crate::core::Outcome;
use async_trait::async_trait;
use secrecy::Secret;
use serde::{Deserialize, Serialize};

/// Prompt for a single generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }
}

/// Classified result of one provider call. Provider-specific error shapes
/// never cross this boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub outcome: Outcome,
    /// Generated text, present only on success.
    pub text: Option<String>,
    /// Upstream HTTP status, absent for transport errors and timeouts.
    pub status: Option<u16>,
}

impl CallResult {
    pub fn failed(outcome: Outcome, status: Option<u16>) -> Self {
        Self {
            outcome,
            text: None,
            status,
        }
    }
}

/// One outbound call to the generative-AI provider with one credential.
///
/// Implementations enforce their own timeout and report a timed-out call as
/// `OtherFailure`. They never touch the credential store.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn generate(&self, secret: &Secret<String>, request: &GenerateRequest) -> CallResult;

    /// Minimal-cost validation call used by the health prober.
    async fn probe(&self, secret: &Secret<String>) -> Outcome;
}
