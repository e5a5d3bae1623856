use crate::{error::AnalysisError, state::RequestState, types::AnalysisResult};

pub fn format_analysis_readable(result: &AnalysisResult) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", result.title));
    output.push_str(&format!(
        "**Predicted views:** {} | **CTR:** {}\n\n",
        result.predicted_views, result.ctr
    ));

    output.push_str("## Insights\n\n");
    if result.insights.is_empty() {
        output.push_str("(none)\n");
    }
    for insight in &result.insights {
        output.push_str(&format!("• {}\n", insight));
    }
    output.push('\n');

    output.push_str("## Recommendations\n\n");
    if result.recommendations.is_empty() {
        output.push_str("(none)\n");
    } else {
        let tags: Vec<String> = result
            .recommendations
            .iter()
            .map(|tag| format!("[{}]", tag))
            .collect();
        output.push_str(&tags.join(" "));
        output.push('\n');
    }

    output
}

pub fn format_error_readable(error: &AnalysisError) -> String {
    format!("{}\n({})", error.user_message(), error)
}

/// One-line summary of a session state.
pub fn format_state_line(state: &RequestState) -> String {
    match state {
        RequestState::Idle => "idle".to_string(),
        RequestState::InFlight(concept) => format!("analyzing \"{}\"", concept),
        RequestState::Succeeded(result) => format!("done: {}", result.title),
        RequestState::Failed(error) => format!("failed: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConceptInput;

    fn result() -> AnalysisResult {
        AnalysisResult {
            title: "Neon Tokyo Nights".to_string(),
            predicted_views: "2.4M".to_string(),
            ctr: "8.2%".to_string(),
            insights: vec!["Night footage travels well".to_string()],
            recommendations: vec!["#travel".to_string(), "#4k".to_string()],
        }
    }

    #[test]
    fn test_readable_report_keeps_fields_verbatim() {
        let text = format_analysis_readable(&result());
        assert!(text.starts_with("# Neon Tokyo Nights\n"));
        assert!(text.contains("**Predicted views:** 2.4M | **CTR:** 8.2%"));
        assert!(text.contains("• Night footage travels well\n"));
        assert!(text.contains("[#travel] [#4k]"));
    }

    #[test]
    fn test_empty_sections_are_marked() {
        let mut empty = result();
        empty.insights.clear();
        empty.recommendations.clear();
        let text = format_analysis_readable(&empty);
        assert_eq!(text.matches("(none)").count(), 2);
    }

    #[test]
    fn test_state_lines() {
        assert_eq!(format_state_line(&RequestState::Idle), "idle");
        let concept = ConceptInput::parse("cats").unwrap();
        assert_eq!(
            format_state_line(&RequestState::InFlight(concept)),
            "analyzing \"cats\""
        );
        assert_eq!(
            format_state_line(&RequestState::Succeeded(result())),
            "done: Neon Tokyo Nights"
        );
        assert!(format_state_line(&RequestState::Failed(AnalysisError::Timeout))
            .starts_with("failed:"));
    }
}
