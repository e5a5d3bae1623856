use tracing::{debug, info, warn};

use crate::{
    endpoint::{GenerativeModel, HttpModel},
    error::Result,
    provider::EndpointConfig,
    schema::{parse_analysis, response_schema},
    types::{AnalysisResult, ConceptInput},
};

/// Turns free-text video concepts into validated [`AnalysisResult`]s.
///
/// One call is one request: nothing is retried and nothing is memoized.
pub struct ConceptAnalysisClient<M> {
    model: M,
}

impl ConceptAnalysisClient<HttpModel> {
    pub fn from_config(config: EndpointConfig) -> Result<Self> {
        Ok(Self::new(HttpModel::new(config)?))
    }
}

impl<M: GenerativeModel> ConceptAnalysisClient<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub async fn analyze(&self, concept: &str) -> Result<AnalysisResult> {
        let concept = ConceptInput::parse(concept)?;
        self.analyze_concept(&concept).await
    }

    pub async fn analyze_concept(&self, concept: &ConceptInput) -> Result<AnalysisResult> {
        debug!(
            model = self.model.model(),
            concept_chars = concept.as_str().chars().count(),
            "requesting concept analysis"
        );

        let outcome = match self
            .model
            .generate(&build_prompt(concept), &response_schema())
            .await
        {
            Ok(payload) => parse_analysis(payload.as_deref()),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(result) => info!(
                title = %result.title,
                insights = result.insights.len(),
                recommendations = result.recommendations.len(),
                "concept analysis succeeded"
            ),
            Err(e) => warn!(error = %e, "concept analysis failed"),
        }

        outcome
    }
}

pub fn build_prompt(concept: &ConceptInput) -> String {
    format!(
        "Analyze the following video marketing concept for global distribution potential: \"{}\"",
        concept
    )
}
