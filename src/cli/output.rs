//! The single JSON line each invocation prints on stdout

use crate::types::NormalizationReport;
use serde::Serialize;

/// Machine-readable outcome of one command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: Option<NormalizationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            report: None,
            error: None,
        }
    }

    #[must_use]
    pub fn normalized(report: NormalizationReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
        }
    }

    #[must_use]
    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"success\":{}}}", self.success))
    }

    /// Print to stdout
    pub fn emit(&self) {
        println!("{}", self.to_json());
    }
}
