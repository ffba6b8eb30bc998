//! Prompt templates for the expand and review steps

use crate::persona::PersonaSpec;
use crate::run::proposal::Proposal;

/// Templates for generating prompts at each pipeline step
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for the expand step
    pub fn expand_system() -> &'static str {
        r#"You are a senior product strategist turning brief ideas into structured proposals.
Be concrete and honest: state the real problem, a feasible solution, the assumptions it rests on
and what is explicitly out of scope. Do not invent metrics you cannot justify.
Respond with a single JSON object and nothing else."#
    }

    /// User prompt expanding a brief idea into a proposal
    pub fn expand_prompt(
        idea: &str,
        extra_context: &serde_json::Map<String, serde_json::Value>,
    ) -> String {
        let mut prompt = format!(
            r#"Expand the following idea into a structured proposal:

{}
"#,
            idea.trim()
        );

        if !extra_context.is_empty() {
            prompt.push_str("\nAdditional context:\n");
            for (key, value) in extra_context {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                prompt.push_str(&format!("- {}: {}\n", key, rendered));
            }
        }

        prompt.push_str(Self::PROPOSAL_SCHEMA);
        prompt
    }

    /// User prompt applying edit notes to a parent proposal
    pub fn apply_edits_prompt(parent: &Proposal, notes: &str) -> String {
        format!(
            r#"Here is an existing proposal:

{}
Revise it according to these notes, keeping everything the notes do not touch unchanged:

{}
{}"#,
            parent.render(),
            notes.trim(),
            Self::PROPOSAL_SCHEMA
        )
    }

    const PROPOSAL_SCHEMA: &'static str = r#"
Respond with JSON in exactly this shape:
{
  "problem_statement": "string",
  "solution": "string",
  "assumptions": ["string"],
  "non_goals": ["string"]
}"#;

    /// System prompt for one persona's review
    pub fn review_system(persona: &PersonaSpec) -> String {
        format!(
            r#"You are the {} on a proposal review council.
You focus on {}.
Review the proposal independently and critically from that perspective only.
A blocking issue is something that must be fixed before the proposal can be approved.
Flag a blocking issue as security_critical only when it exposes users, data or systems to harm.
Respond with a single JSON object and nothing else."#,
            persona.id.display_name(),
            persona.id.focus()
        )
    }

    /// User prompt asking for a structured review of a proposal
    pub fn review_prompt(proposal: &Proposal) -> String {
        format!(
            r#"Review the following proposal:

{}
Respond with JSON in exactly this shape:
{{
  "confidence_score": 0.0,
  "strengths": ["string"],
  "concerns": ["string"],
  "recommendations": ["string"],
  "blocking_issues": [{{"description": "string", "security_critical": false}}],
  "estimated_effort": "string",
  "dependency_risks": ["string"]
}}

confidence_score is your confidence from 0.0 to 1.0 that the proposal should proceed as written."#,
            proposal.render()
        )
    }
}
