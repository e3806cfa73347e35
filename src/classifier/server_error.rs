// src/classifier/server_error.rs

use super::base::OutcomeClassifier;
use crate::core::Outcome;
use reqwest::StatusCode;
use tracing::warn;

/// Timeouts and upstream errors. Not the credential's fault, so they only
/// count toward the failure streak.
pub struct ServerErrorClassifier;

impl OutcomeClassifier for ServerErrorClassifier {
    fn classify(&self, status: StatusCode, _body: &str) -> Option<Outcome> {
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            warn!(status = status.as_u16(), "Provider returned a transient error");
            return Some(Outcome::OtherFailure);
        }
        None
    }
}
