// src/classifier/base.rs

use crate::core::Outcome;
use reqwest::StatusCode;

/// One link in the classification chain.
pub trait OutcomeClassifier: Send + Sync {
    /// Returns `Some` when this classifier recognizes the response, `None` to
    /// let the next classifier in the chain try.
    fn classify(&self, status: StatusCode, body: &str) -> Option<Outcome>;
}
