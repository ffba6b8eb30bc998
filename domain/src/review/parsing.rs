//! Structured output parsing for reviewer responses.
//!
//! Models are asked to answer with a single JSON object, but in practice the
//! object arrives wrapped in a Markdown fence or surrounded by prose. These
//! functions locate the object, deserialize it leniently (field aliases,
//! string-or-object blocking issues) and then validate it strictly.
//!
//! | Function | Step | Output |
//! |----------|------|--------|
//! | [`parse_proposal_output`] | expand | [`Proposal`] |
//! | [`parse_review_output`] | review | [`ReviewContent`] |

use crate::review::entities::{BlockingIssue, ReviewContent};
use crate::run::proposal::Proposal;
use crate::util::truncate_str;
use serde::Deserialize;
use thiserror::Error;

/// Bytes of raw output kept in error messages.
const SNIPPET_BYTES: usize = 200;

/// Why a model response could not be turned into a structured result.
///
/// All variants are schema failures: retrying the same prompt may succeed,
/// but the response itself is unusable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutputParseError {
    #[error("No JSON object found in output: {0}")]
    NoJson(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Extract the JSON object from a model response.
///
/// Prefers a ```json fenced block, then falls back to the span from the
/// first `{` to the last `}`.
fn extract_json(response: &str) -> Result<&str, OutputParseError> {
    if let Some(start) = response.find("```json") {
        let body = &response[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Ok(body[..end].trim());
        }
    }

    if let Some(start) = response.find('{')
        && let Some(end) = response.rfind('}')
        && end > start
    {
        return Ok(&response[start..=end]);
    }

    Err(OutputParseError::NoJson(
        truncate_str(response.trim(), SNIPPET_BYTES).to_string(),
    ))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBlockingIssue {
    Text(String),
    Detailed {
        #[serde(alias = "issue")]
        description: String,
        #[serde(default)]
        security_critical: bool,
    },
}

impl From<RawBlockingIssue> for BlockingIssue {
    fn from(raw: RawBlockingIssue) -> Self {
        match raw {
            RawBlockingIssue::Text(description) => BlockingIssue::new(description),
            RawBlockingIssue::Detailed {
                description,
                security_critical,
            } => BlockingIssue {
                description,
                security_critical,
            },
        }
    }
}

#[derive(Deserialize)]
struct RawReview {
    #[serde(alias = "confidence_score")]
    confidence: Option<f64>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    blocking_issues: Vec<RawBlockingIssue>,
    #[serde(default, alias = "effort_estimate")]
    estimated_effort: Option<String>,
    #[serde(default)]
    dependency_risks: Vec<String>,
}

/// Parse a persona review from a model response.
///
/// # Examples
///
/// ```
/// use council_domain::review::parsing::parse_review_output;
///
/// let review = parse_review_output(r#"{"confidence_score": 0.72, "concerns": ["cost"]}"#).unwrap();
/// assert_eq!(review.confidence, 0.72);
/// assert_eq!(review.concerns, vec!["cost".to_string()]);
/// ```
pub fn parse_review_output(response: &str) -> Result<ReviewContent, OutputParseError> {
    let json = extract_json(response)?;
    let raw: RawReview =
        serde_json::from_str(json).map_err(|e| OutputParseError::InvalidJson(e.to_string()))?;

    let confidence = raw
        .confidence
        .ok_or(OutputParseError::MissingField("confidence"))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(OutputParseError::OutOfRange {
            field: "confidence",
            value: confidence,
        });
    }

    Ok(ReviewContent {
        confidence,
        strengths: raw.strengths,
        concerns: raw.concerns,
        recommendations: raw.recommendations,
        blocking_issues: raw.blocking_issues.into_iter().map(Into::into).collect(),
        estimated_effort: raw.estimated_effort.filter(|e| !e.trim().is_empty()),
        dependency_risks: raw.dependency_risks,
    })
}

#[derive(Deserialize)]
struct RawProposal {
    #[serde(alias = "problem")]
    problem_statement: Option<String>,
    #[serde(alias = "proposed_solution")]
    solution: Option<String>,
    #[serde(default)]
    assumptions: Vec<String>,
    #[serde(default)]
    non_goals: Vec<String>,
}

/// Parse an expanded proposal from a model response.
pub fn parse_proposal_output(response: &str) -> Result<Proposal, OutputParseError> {
    let json = extract_json(response)?;
    let raw: RawProposal =
        serde_json::from_str(json).map_err(|e| OutputParseError::InvalidJson(e.to_string()))?;

    let problem_statement = raw
        .problem_statement
        .filter(|s| !s.trim().is_empty())
        .ok_or(OutputParseError::MissingField("problem_statement"))?;
    let solution = raw
        .solution
        .filter(|s| !s.trim().is_empty())
        .ok_or(OutputParseError::MissingField("solution"))?;

    Ok(Proposal {
        problem_statement,
        solution,
        assumptions: raw.assumptions,
        non_goals: raw.non_goals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_review_fenced() {
        let response = r#"
Here is my review:
```json
{
  "confidence_score": 0.85,
  "strengths": ["clear scope"],
  "concerns": ["vendor lock-in"],
  "recommendations": ["add an exit plan"],
  "blocking_issues": [
    {"description": "Secrets stored in repo", "security_critical": true},
    "No owner for on-call"
  ],
  "estimated_effort": "3 weeks",
  "dependency_risks": ["payments API"]
}
```
"#;
        let review = parse_review_output(response).unwrap();
        assert_eq!(review.confidence, 0.85);
        assert_eq!(review.blocking_issues.len(), 2);
        assert!(review.blocking_issues[0].security_critical);
        assert!(!review.blocking_issues[1].security_critical);
        assert_eq!(review.blocking_issues[1].description, "No owner for on-call");
        assert_eq!(review.estimated_effort.as_deref(), Some("3 weeks"));
    }

    #[test]
    fn test_parse_review_with_surrounding_prose() {
        let response = r#"Sure. {"confidence": 0.4, "concerns": ["unclear demand"]} Hope this helps."#;
        let review = parse_review_output(response).unwrap();
        assert_eq!(review.confidence, 0.4);
        assert!(review.blocking_issues.is_empty());
    }

    #[test]
    fn test_parse_review_rejects_out_of_range() {
        let err = parse_review_output(r#"{"confidence": 8}"#).unwrap_err();
        assert!(matches!(
            err,
            OutputParseError::OutOfRange {
                field: "confidence",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_review_requires_confidence() {
        let err = parse_review_output(r#"{"strengths": []}"#).unwrap_err();
        assert_eq!(err, OutputParseError::MissingField("confidence"));
    }

    #[test]
    fn test_parse_review_no_json() {
        let err = parse_review_output("I think it's fine.").unwrap_err();
        assert!(matches!(err, OutputParseError::NoJson(_)));
    }

    #[test]
    fn test_parse_review_invalid_json() {
        let err = parse_review_output("{confidence: high}").unwrap_err();
        assert!(matches!(err, OutputParseError::InvalidJson(_)));
    }

    #[test]
    fn test_parse_proposal() {
        let response = r#"```json
{"problem_statement": "Support tickets pile up", "solution": "Triage bot",
 "assumptions": ["Tickets are in English"], "non_goals": ["Replacing agents"]}
```"#;
        let proposal = parse_proposal_output(response).unwrap();
        assert_eq!(proposal.problem_statement, "Support tickets pile up");
        assert_eq!(proposal.assumptions.len(), 1);
        assert_eq!(proposal.non_goals, vec!["Replacing agents".to_string()]);
    }

    #[test]
    fn test_parse_proposal_requires_solution() {
        let err = parse_proposal_output(r#"{"problem_statement": "x", "solution": "  "}"#)
            .unwrap_err();
        assert_eq!(err, OutputParseError::MissingField("solution"));
    }
}
