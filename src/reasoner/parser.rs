//! Oracle output grammar
//!
//! The oracle must answer in the ReAct single-input format: either an
//! Action / Action Input pair or a Final Answer. Output matching neither
//! grammar (or both at once) is a fatal parse error.

use crate::error::AgentError;
use crate::Result;
use serde_json::Value;

/// A parsed oracle directive
#[derive(Debug, Clone, PartialEq)]
pub enum OracleDirective {
    Action { tool: String, input: Value },
    FinalAnswer(String),
}

const ACTION_MARKER: &str = "Action:";
const ACTION_INPUT_MARKER: &str = "Action Input:";
const FINAL_ANSWER_MARKER: &str = "Final Answer:";

pub fn parse_directive(raw: &str) -> Result<OracleDirective> {
    let cleaned = strip_fences(raw);

    let has_action = find_marker_line(cleaned, ACTION_MARKER).is_some();
    let has_final = cleaned.contains(FINAL_ANSWER_MARKER);

    if has_action && has_final {
        return Err(AgentError::ReasoningParseError(format!(
            "Output contains both an Action and a Final Answer: {}",
            snippet(cleaned)
        )));
    }

    if has_final {
        let idx = cleaned.find(FINAL_ANSWER_MARKER).unwrap();
        let answer = cleaned[idx + FINAL_ANSWER_MARKER.len()..].trim();
        return Ok(OracleDirective::FinalAnswer(answer.to_string()));
    }

    if has_action {
        let tool = find_marker_line(cleaned, ACTION_MARKER)
            .map(|rest| rest.trim().trim_matches('`').to_string())
            .filter(|tool| !tool.is_empty())
            .ok_or_else(|| {
                AgentError::ReasoningParseError(format!(
                    "Action directive without a tool name: {}",
                    snippet(cleaned)
                ))
            })?;

        let input_text = cleaned
            .find(ACTION_INPUT_MARKER)
            .map(|idx| {
                let after = &cleaned[idx + ACTION_INPUT_MARKER.len()..];
                // The input runs until the oracle starts a new Observation
                // (should not happen with stop sequences, but be safe).
                match after.find("\nObservation") {
                    Some(end) => after[..end].trim(),
                    None => after.trim(),
                }
            })
            .ok_or_else(|| {
                AgentError::ReasoningParseError(format!(
                    "Action directive without an Action Input: {}",
                    snippet(cleaned)
                ))
            })?;

        let input = parse_action_input(input_text);
        return Ok(OracleDirective::Action { tool, input });
    }

    Err(AgentError::ReasoningParseError(format!(
        "Output matches neither Action nor Final Answer grammar: {}",
        snippet(cleaned)
    )))
}

/// Tool inputs are expected as JSON objects; a non-JSON input is passed
/// through as a bare string and rejected downstream by the tool's own
/// input validation.
fn parse_action_input(text: &str) -> Value {
    let trimmed = strip_fences(text);
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Drop surrounding ``` fences the oracle sometimes wraps output in.
fn strip_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// First line starting with the marker, returning the remainder of that line.
fn find_marker_line<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.lines()
        .map(str::trim_start)
        .find(|line| line.starts_with(marker))
        .map(|line| &line[marker.len()..])
}

fn snippet(raw: &str) -> String {
    let mut s: String = raw.chars().take(120).collect();
    if raw.chars().count() > 120 {
        s.push_str("...");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_action_with_json_input() {
        let raw = "Thought: Do I need to use a tool? Yes\nAction: credit_scoring\nAction Input: {\"acres\": 2.5, \"yieldStatus\": \"high\", \"kycStatus\": \"VERIFIED\"}";

        let directive = parse_directive(raw).unwrap();
        assert_eq!(
            directive,
            OracleDirective::Action {
                tool: "credit_scoring".to_string(),
                input: json!({"acres": 2.5, "yieldStatus": "high", "kycStatus": "VERIFIED"}),
            }
        );
    }

    #[test]
    fn test_parse_final_answer() {
        let raw = "Thought: Do I need to use a tool? No\nFinal Answer: Your loan is approved.";

        let directive = parse_directive(raw).unwrap();
        assert_eq!(
            directive,
            OracleDirective::FinalAnswer("Your loan is approved.".to_string())
        );
    }

    #[test]
    fn test_fenced_output_is_accepted() {
        let raw = "```\nThought: Do I need to use a tool? No\nFinal Answer: Done.\n```";

        let directive = parse_directive(raw).unwrap();
        assert_eq!(directive, OracleDirective::FinalAnswer("Done.".to_string()));
    }

    #[test]
    fn test_both_action_and_final_answer_is_fatal() {
        let raw = "Action: credit_scoring\nAction Input: {}\nFinal Answer: done";

        let err = parse_directive(raw).unwrap_err();
        assert!(matches!(err, AgentError::ReasoningParseError(_)));
    }

    #[test]
    fn test_neither_grammar_is_fatal() {
        let err = parse_directive("I am not sure what to do next.").unwrap_err();
        assert!(matches!(err, AgentError::ReasoningParseError(_)));
    }

    #[test]
    fn test_action_without_input_is_fatal() {
        let err = parse_directive("Action: credit_scoring").unwrap_err();
        assert!(matches!(err, AgentError::ReasoningParseError(_)));
    }

    #[test]
    fn test_non_json_input_becomes_string() {
        let raw = "Action: agri_stack_lookup\nAction Input: plot MH-204";

        let directive = parse_directive(raw).unwrap();
        match directive {
            OracleDirective::Action { input, .. } => {
                assert_eq!(input, Value::String("plot MH-204".to_string()));
            }
            _ => panic!("expected action"),
        }
    }
}
