// src/classifier/success.rs

use super::base::OutcomeClassifier;
use crate::core::Outcome;
use reqwest::StatusCode;

pub struct SuccessClassifier;

impl OutcomeClassifier for SuccessClassifier {
    fn classify(&self, status: StatusCode, _body: &str) -> Option<Outcome> {
        status.is_success().then_some(Outcome::Success)
    }
}
