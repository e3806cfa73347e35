// src/classifier/quota.rs

use super::base::OutcomeClassifier;
use crate::core::Outcome;
use reqwest::StatusCode;

/// Markers of a quota that only resets with the billing/usage period,
/// as opposed to a per-minute throttle.
const QUOTA_MARKERS: &[&str] = &["perday", "per day", "billing", "insufficient_quota"];

pub struct QuotaClassifier;

impl OutcomeClassifier for QuotaClassifier {
    fn classify(&self, status: StatusCode, body: &str) -> Option<Outcome> {
        match status {
            StatusCode::PAYMENT_REQUIRED => Some(Outcome::Exhausted),
            StatusCode::TOO_MANY_REQUESTS => {
                let body = body.to_ascii_lowercase();
                QUOTA_MARKERS
                    .iter()
                    .any(|marker| body.contains(marker))
                    .then_some(Outcome::Exhausted)
            }
            _ => None,
        }
    }
}
