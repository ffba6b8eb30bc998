//! Reviewer client for OpenAI-compatible chat completion endpoints
//!
//! One HTTP call per completion request. Transport failures are classified
//! for the caller's retry policy:
//!
//! | Outcome | Error |
//! |---------|-------|
//! | 429 | `RateLimited` |
//! | 408, client timeout | `Timeout` |
//! | 5xx, connection error, garbled envelope | `Transport` |
//! | other 4xx | `Fatal` |
//! | reply that does not parse | re-asked, then `SchemaInvalid` |

use crate::config::FileReviewerConfig;
use async_trait::async_trait;
use council_application::{
    CompletionInput, CompletionRequest, ReviewerClient, ReviewerError, StructuredResult,
};
use council_domain::util::elide;
use council_domain::{
    OutputParseError, PromptTemplate, StepName, parse_proposal_output, parse_review_output,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const ERROR_SNIPPET_BYTES: usize = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiReviewerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_schema_retries: u32,
}

impl OpenAiReviewerClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ReviewerError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ReviewerError::Fatal(format!("Cannot build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            max_schema_retries: 1,
        })
    }

    /// Build from the `[reviewer]` section, reading the key from `api_key_env`.
    ///
    /// A missing key is allowed (local endpoints often need none); the
    /// endpoint will reject the first call if it does need one.
    pub fn from_config(config: &FileReviewerConfig) -> Result<Self, ReviewerError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "No API key in environment, calling the reviewer endpoint unauthenticated"
            );
        }
        Ok(Self::new(
            &config.base_url,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_max_schema_retries(config.max_schema_retries))
    }

    pub fn with_max_schema_retries(mut self, retries: u32) -> Self {
        self.max_schema_retries = retries;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn initial_messages(request: &CompletionRequest) -> Result<Vec<ChatMessage>, ReviewerError> {
        let (system, user) = match (&request.input, &request.persona) {
            (CompletionInput::Idea { idea, extra_context }, _) => (
                PromptTemplate::expand_system().to_string(),
                PromptTemplate::expand_prompt(idea, extra_context),
            ),
            (CompletionInput::ApplyEdits { parent, notes }, _) => (
                PromptTemplate::expand_system().to_string(),
                PromptTemplate::apply_edits_prompt(parent, notes),
            ),
            (CompletionInput::Review { proposal }, Some(persona)) => (
                PromptTemplate::review_system(persona),
                PromptTemplate::review_prompt(proposal),
            ),
            (CompletionInput::Review { .. }, None) => {
                return Err(ReviewerError::Fatal(
                    "review request without a persona".to_string(),
                ));
            }
        };
        Ok(vec![
            ChatMessage::new("system", system),
            ChatMessage::new("user", user),
        ])
    }

    fn parse(request: &CompletionRequest, content: &str) -> Result<StructuredResult, OutputParseError> {
        match request.input {
            CompletionInput::Review { .. } => parse_review_output(content).map(StructuredResult::Review),
            CompletionInput::Idea { .. } | CompletionInput::ApplyEdits { .. } => {
                parse_proposal_output(content).map(StructuredResult::Proposal)
            }
        }
    }

    async fn chat(
        &self,
        request: &CompletionRequest,
        messages: &[ChatMessage],
    ) -> Result<String, ReviewerError> {
        let body = ChatCompletionRequest {
            model: request.params.model.as_str(),
            messages,
            temperature: request.params.temperature,
        };

        let mut builder = self.http.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ReviewerError::Timeout
            } else {
                ReviewerError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ReviewerError::Timeout
            } else {
                ReviewerError::Transport(format!("Malformed completion envelope: {}", e))
            }
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ReviewerError::SchemaInvalid("completion has no choices".to_string()))
    }
}

fn classify_status(status: StatusCode, body: &str) -> ReviewerError {
    let detail = format!("{}: {}", status, elide(body.trim(), ERROR_SNIPPET_BYTES));
    match status {
        StatusCode::TOO_MANY_REQUESTS => ReviewerError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT => ReviewerError::Timeout,
        s if s.is_server_error() => ReviewerError::Transport(detail),
        _ => ReviewerError::Fatal(detail),
    }
}

#[async_trait]
impl ReviewerClient for OpenAiReviewerClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<StructuredResult, ReviewerError> {
        let mut messages = Self::initial_messages(request)?;
        let persona = request.persona.as_ref().map(|p| p.id.as_str());

        let mut attempt = 0;
        loop {
            let content = self.chat(request, &messages).await?;
            match Self::parse(request, &content) {
                Ok(result) => {
                    debug!(
                        step = %request.step,
                        persona,
                        schema_retries = attempt,
                        "Completion parsed"
                    );
                    return Ok(result);
                }
                Err(e) if attempt < self.max_schema_retries => {
                    attempt += 1;
                    warn!(
                        step = %request.step,
                        persona,
                        attempt,
                        error = %e,
                        "Reply failed validation, asking again"
                    );
                    messages.push(ChatMessage::new("assistant", content));
                    messages.push(ChatMessage::new(
                        "user",
                        format!(
                            "Your reply could not be used: {}. Reply again with only the JSON object in the requested shape.",
                            e
                        ),
                    ));
                }
                Err(e) => {
                    let what = if request.step == StepName::Review {
                        "review"
                    } else {
                        "proposal"
                    };
                    return Err(ReviewerError::SchemaInvalid(format!("{}: {}", what, e)));
                }
            }
        }
    }
}
