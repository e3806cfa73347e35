// src/classifier/rate_limit.rs

use super::base::OutcomeClassifier;
use crate::core::Outcome;
use reqwest::StatusCode;

pub struct RateLimitClassifier;

impl OutcomeClassifier for RateLimitClassifier {
    fn classify(&self, status: StatusCode, _body: &str) -> Option<Outcome> {
        (status == StatusCode::TOO_MANY_REQUESTS).then_some(Outcome::RateLimited)
    }
}
