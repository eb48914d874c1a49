use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Successful,
    Unsuccessful,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Successful => write!(f, "SUCCESSFUL"),
            VerificationStatus::Unsuccessful => write!(f, "UNSUCCESSFUL"),
        }
    }
}

/// Outcome of one grading run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub messages: Vec<String>,
}

impl VerificationResult {
    pub fn is_successful(&self) -> bool {
        self.status == VerificationStatus::Successful
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.status)?;
        for message in &self.messages {
            writeln!(f, "- {message}")?;
        }
        Ok(())
    }
}

/// Turn collected diagnostics into a result: no diagnostics means success.
pub fn report(diagnostics: Vec<String>, success_message: &str) -> VerificationResult {
    if diagnostics.is_empty() {
        VerificationResult {
            status: VerificationStatus::Successful,
            messages: vec![success_message.to_string()],
        }
    } else {
        VerificationResult {
            status: VerificationStatus::Unsuccessful,
            messages: diagnostics,
        }
    }
}
