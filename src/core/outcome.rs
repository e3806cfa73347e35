// src/core/outcome.rs

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Classified result of one provider call or probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    RateLimited,
    Exhausted,
    Invalid,
    /// Network error, timeout or anything unclassified.
    OtherFailure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RateLimited => "rate_limited",
            Self::Exhausted => "exhausted",
            Self::Invalid => "invalid",
            Self::OtherFailure => "other_failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized outcome names parse as `OtherFailure`.
impl FromStr for Outcome {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "rate_limited" => Self::RateLimited,
            "exhausted" => Self::Exhausted,
            "invalid" => Self::Invalid,
            _ => Self::OtherFailure,
        })
    }
}

impl From<&str> for Outcome {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_round_trip() {
        for outcome in [
            Outcome::Success,
            Outcome::RateLimited,
            Outcome::Exhausted,
            Outcome::Invalid,
            Outcome::OtherFailure,
        ] {
            assert_eq!(Outcome::from(outcome.as_str()), outcome);
        }
    }

    #[test]
    fn unknown_names_are_other_failure() {
        assert_eq!(Outcome::from("teapot"), Outcome::OtherFailure);
        assert_eq!(Outcome::from(""), Outcome::OtherFailure);
        assert_eq!(Outcome::from(" SUCCESS "), Outcome::Success);
    }
}
