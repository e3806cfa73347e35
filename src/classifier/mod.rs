// src/classifier/mod.rs

pub mod base;
pub mod invalid_api_key;
pub mod quota;
pub mod rate_limit;
pub mod server_error;
pub mod success;

pub use base::OutcomeClassifier;

use crate::core::Outcome;
use invalid_api_key::InvalidApiKeyClassifier;
use quota::QuotaClassifier;
use rate_limit::RateLimitClassifier;
use reqwest::StatusCode;
use server_error::ServerErrorClassifier;
use std::sync::Arc;
use success::SuccessClassifier;
use tracing::debug;

/// Runs a provider response through an ordered chain of classifiers.
/// Anything no classifier claims is `OtherFailure`.
#[derive(Clone)]
pub struct ResponseClassifier {
    classifiers: Arc<Vec<Box<dyn OutcomeClassifier>>>,
}

impl ResponseClassifier {
    pub fn new(classifiers: Vec<Box<dyn OutcomeClassifier>>) -> Self {
        Self {
            classifiers: Arc::new(classifiers),
        }
    }

    pub fn classify(&self, status: StatusCode, body: &str) -> Outcome {
        let outcome = self
            .classifiers
            .iter()
            .find_map(|classifier| classifier.classify(status, body))
            .unwrap_or(Outcome::OtherFailure);
        debug!(status = status.as_u16(), outcome = %outcome, "Provider response classified");
        outcome
    }
}

impl Default for ResponseClassifier {
    /// Order matters: quota exhaustion must be recognized before the generic
    /// 429 rate-limit rule.
    fn default() -> Self {
        Self::new(vec![
            Box::new(SuccessClassifier),
            Box::new(InvalidApiKeyClassifier),
            Box::new(QuotaClassifier),
            Box::new(RateLimitClassifier),
            Box::new(ServerErrorClassifier),
        ])
    }
}
