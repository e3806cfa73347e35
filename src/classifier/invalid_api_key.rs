// src/classifier/invalid_api_key.rs

use super::base::OutcomeClassifier;
use crate::core::Outcome;
use reqwest::StatusCode;

/// Provider rejected the credential itself.
pub struct InvalidApiKeyClassifier;

impl OutcomeClassifier for InvalidApiKeyClassifier {
    fn classify(&self, status: StatusCode, body: &str) -> Option<Outcome> {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(Outcome::Invalid),
            StatusCode::BAD_REQUEST
                if body.contains("API_KEY_INVALID") || body.contains("API key not valid") =>
            {
                Some(Outcome::Invalid)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bad_request_is_not_a_key_problem() {
        let outcome = InvalidApiKeyClassifier.classify(StatusCode::BAD_REQUEST, "{\"error\":\"bad prompt\"}");
        assert!(outcome.is_none());
    }
}
