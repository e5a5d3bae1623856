use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// A video concept that has passed local validation: trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptInput(String);

impl ConceptInput {
    pub fn parse(text: &str) -> Result<Self, AnalysisError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConceptInput {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub title: String,
    pub predicted_views: String,
    pub ctr: String,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}
