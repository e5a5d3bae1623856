use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::AnalysisError,
    types::{AnalysisResult, ConceptInput},
};

/// Correlates a completion with the `start` that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(Uuid);

impl RequestToken {
    fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    InFlight(ConceptInput),
    Succeeded(AnalysisResult),
    Failed(AnalysisError),
}

impl RequestState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RequestState::InFlight(_))
    }

    pub fn concept(&self) -> Option<&ConceptInput> {
        match self {
            RequestState::InFlight(concept) => Some(concept),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            RequestState::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match self {
            RequestState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Synchronous rejection of a `start` call. State is left untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    #[error("Concept is empty")]
    EmptyInput,

    #[error("An analysis is already in flight")]
    Busy,
}

/// Idle → InFlight → Succeeded | Failed, with at most one request in flight.
///
/// Every accepted `start` mints a fresh [`RequestToken`]; `resolve` only applies
/// an outcome whose token matches the current in-flight request.
#[derive(Debug, Default)]
pub struct AnalysisRequestState {
    state: RequestState,
    in_flight: Option<RequestToken>,
}

impl AnalysisRequestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn in_flight_token(&self) -> Option<RequestToken> {
        self.in_flight
    }

    /// Begin a new analysis, discarding any previous result or error.
    pub fn start(&mut self, concept: &str) -> Result<(RequestToken, ConceptInput), StartError> {
        if self.state.is_in_flight() {
            return Err(StartError::Busy);
        }

        let concept = ConceptInput::parse(concept).map_err(|_| StartError::EmptyInput)?;
        let token = RequestToken::mint();

        self.state = RequestState::InFlight(concept.clone());
        self.in_flight = Some(token);

        Ok((token, concept))
    }

    /// Apply the outcome of the request identified by `token`.
    ///
    /// Returns `Err(AnalysisError::Cancelled)` when the token is stale; the
    /// outcome is dropped and the state is not touched.
    pub fn resolve(
        &mut self,
        token: RequestToken,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> Result<(), AnalysisError> {
        if self.in_flight != Some(token) {
            return Err(AnalysisError::Cancelled);
        }

        self.in_flight = None;
        self.state = match outcome {
            Ok(result) => RequestState::Succeeded(result),
            Err(AnalysisError::Cancelled) => RequestState::Idle,
            Err(error) => RequestState::Failed(error),
        };

        Ok(())
    }

    /// Return to `Idle` from any state. Returns the invalidated token, if any.
    pub fn reset(&mut self) -> Option<RequestToken> {
        self.state = RequestState::Idle;
        self.in_flight.take()
    }
}
