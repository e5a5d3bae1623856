use thiserror::Error;

/// Classified failure of a single concept analysis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Concept is empty")]
    EmptyInput,

    #[error("Network error{}: {reason}", status_suffix(.status))]
    NetworkError { status: Option<u16>, reason: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Endpoint returned an empty response")]
    EmptyResponse,

    #[error("Response is not valid JSON: {reason}")]
    MalformedJson { reason: String },

    #[error("Response violates the analysis schema at `{field}`: {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("Analysis timed out")]
    Timeout,

    #[error("Analysis was cancelled")]
    Cancelled,
}

/// Fieldless discriminant of [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyInput,
    NetworkError,
    Unauthorized,
    EmptyResponse,
    MalformedJson,
    SchemaViolation,
    Timeout,
    Cancelled,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::EmptyInput => ErrorKind::EmptyInput,
            AnalysisError::NetworkError { .. } => ErrorKind::NetworkError,
            AnalysisError::Unauthorized { .. } => ErrorKind::Unauthorized,
            AnalysisError::EmptyResponse => ErrorKind::EmptyResponse,
            AnalysisError::MalformedJson { .. } => ErrorKind::MalformedJson,
            AnalysisError::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            AnalysisError::Timeout => ErrorKind::Timeout,
            AnalysisError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// `Cancelled` only suppresses stale completions and never reaches a renderer.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, AnalysisError::Cancelled)
    }

    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short message suitable for showing to the person who submitted the concept.
    pub fn user_message(&self) -> &'static str {
        match self {
            AnalysisError::EmptyInput => "Describe your video concept before analyzing it.",
            AnalysisError::NetworkError { .. } => {
                "Could not reach the analysis service. Check your connection and try again."
            }
            AnalysisError::Unauthorized { .. } => {
                "The analysis service rejected the API key. Check your credentials."
            }
            AnalysisError::EmptyResponse => "The analysis service returned nothing. Try again.",
            AnalysisError::MalformedJson { .. } | AnalysisError::SchemaViolation { .. } => {
                "The analysis service returned an unexpected answer. Try again."
            }
            AnalysisError::Timeout => "The analysis took too long and was abandoned.",
            AnalysisError::Cancelled => "The analysis was cancelled.",
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AnalysisError::Timeout;
        }

        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                AnalysisError::Unauthorized {
                    reason: err.to_string(),
                }
            }
            status => AnalysisError::NetworkError {
                status: status.map(|s| s.as_u16()),
                reason: err.to_string(),
            },
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
