use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::programs::ProgramKey;

/// Failures raised by the analysis engine and its collaborators.
///
/// An ineligible program is never an error; it is a successful determination
/// carried in that program's payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IncentiveError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("network failure contacting {service}: {message}")]
    Network { service: String, message: String },
    #[error("{service} responded with status {status}: {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("no completed analysis available; analyze a property first")]
    NoAnalysis,
}

impl IncentiveError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::NoAnalysis => ErrorKind::Validation,
            Self::Network { .. } => ErrorKind::Network,
            Self::Api { .. } => ErrorKind::Api,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Attribute this error to a single program for the normalized results map.
    pub fn into_failure(self, program: ProgramKey) -> ProgramFailure {
        ProgramFailure {
            program,
            kind: self.kind(),
            message: self.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Api,
    NotFound,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Validation => "Validation",
            Self::Network => "Network",
            Self::Api => "Upstream API",
            Self::NotFound => "Not Found",
        }
    }
}

/// Error record stored in place of a program payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramFailure {
    pub program: ProgramKey,
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_keep_program_attribution() {
        let failure = IncentiveError::Network {
            service: "geocoder".to_string(),
            message: "timed out".to_string(),
        }
        .into_failure(ProgramKey::CPace);

        assert_eq!(failure.program, ProgramKey::CPace);
        assert_eq!(failure.kind, ErrorKind::Network);
        assert!(failure.message.contains("geocoder"));
    }

    #[test]
    fn missing_analysis_is_a_validation_failure() {
        assert_eq!(IncentiveError::NoAnalysis.kind(), ErrorKind::Validation);
    }
}
