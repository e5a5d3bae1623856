//! Vidscope Core Library
//!
//! Sends free-text video concepts to a generative model under a fixed output
//! schema, validates the answer, and tracks the request lifecycle for a
//! presentation layer.

pub mod client;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod provider;
pub mod schema;
pub mod session;
pub mod state;
pub mod types;

// Re-export commonly used items at crate root
pub use client::{ConceptAnalysisClient, build_prompt};
pub use endpoint::{GenerativeModel, HttpModel};
pub use error::{AnalysisError, ErrorKind, Result};
pub use format::{format_analysis_readable, format_error_readable, format_state_line};
pub use provider::{Dialect, EndpointConfig, Provider, ProviderConfig};
pub use schema::{parse_analysis, response_schema};
pub use session::AnalysisSession;
pub use state::{AnalysisRequestState, RequestState, RequestToken, StartError};
pub use types::{AnalysisResult, ConceptInput};
