//! Claude API integration for session analysis.
//!
//! Provides the external reasoning step of the likelihood analyzer: a compact
//! session summary plus the rule-based score go out, a refined score and list
//! of reasons come back.

use std::fmt;
use std::time::Duration;

use cx_core::{ReasoningError, ReasoningService, Refinement, RefinementRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default request timeout for API calls.
///
/// The analyzer applies its own, tighter bound; this only keeps a stray
/// connection from lingering once the analyzer has moved on.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REFINE_MAX_TOKENS: u32 = 600;
const REFINE_TEMPERATURE: f32 = 0.0;

/// Default model used for refinement.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// System prompt used when the session's class has none of its own.
const DEFAULT_SYSTEM_PROMPT: &str = "You review telemetry from a student's code editor and judge \
     how likely it is that the student typed the work themselves rather than pasting it from a \
     generator.";

/// LLM client errors.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provided API key was invalid.
    #[error("invalid API key: {reason}")]
    InvalidApiKey { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error: {message}")]
    Api { message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<LlmError> for ReasoningError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidResponse(message) => Self::Malformed(message),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Claude API client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client with the given API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or whitespace-only, or if
    /// the HTTP client fails to build.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();

        if api_key.is_empty() {
            return Err(LlmError::InvalidApiKey {
                reason: "API key cannot be empty",
            });
        }
        if api_key.trim().is_empty() {
            return Err(LlmError::InvalidApiKey {
                reason: "API key cannot be whitespace-only",
            });
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(LlmError::ClientBuild)?;

        Ok(Self { http, api_key })
    }

    /// Asks Claude for a refined human-likelihood score.
    pub async fn refine_score(
        &self,
        model: &str,
        input: &RefinementRequest,
    ) -> Result<Refinement, LlmError> {
        let request = MessageRequest {
            model: model.to_string(),
            max_tokens: REFINE_MAX_TOKENS,
            temperature: REFINE_TEMPERATURE,
            system: input
                .system_prompt
                .as_deref()
                .map(str::trim)
                .filter(|prompt| !prompt.is_empty())
                .unwrap_or(DEFAULT_SYSTEM_PROMPT)
                .to_string(),
            messages: vec![Message {
                role: "user",
                content: build_refine_prompt(input),
            }],
        };

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_api_error(&body).unwrap_or_else(|| LlmError::Api {
                message: format!("status {status}: {body}"),
            }));
        }

        let payload: MessageResponse = serde_json::from_str(&body)
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
        let text = extract_text(payload.content)?;
        parse_refinement(&text)
    }
}

/// [`ReasoningService`] backed by the Claude API.
#[derive(Debug, Clone)]
pub struct ClaudeReasoner {
    client: Client,
    model: String,
}

impl ClaudeReasoner {
    pub fn new(client: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl ReasoningService for ClaudeReasoner {
    async fn refine(&self, request: &RefinementRequest) -> Result<Refinement, ReasoningError> {
        tracing::debug!(model = %self.model, "requesting refined analysis");
        Ok(self.client.refine_score(&self.model, request).await?)
    }
}

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

fn extract_text(blocks: Vec<ContentBlock>) -> Result<String, LlmError> {
    let mut pieces = Vec::new();
    for block in blocks {
        if let ContentBlock::Text { text } = block {
            pieces.push(text);
        }
    }
    if pieces.is_empty() {
        return Err(LlmError::InvalidResponse(
            "missing text content".to_string(),
        ));
    }
    Ok(pieces.join("\n"))
}

fn parse_api_error(body: &str) -> Option<LlmError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| LlmError::Api {
            message: payload.error.message,
        })
}

fn build_refine_prompt(input: &RefinementRequest) -> String {
    let mut lines = Vec::new();
    lines.push(
        "Estimate how likely it is that the edits in this session were typed by a human."
            .to_string(),
    );
    lines.push(
        "Return strict JSON: {\"score\":0-100,\"reasons\":[\"reason 1\",\"reason 2\"]}".to_string(),
    );
    lines.push("Rules:".to_string());
    lines.push("- 100 means certainly typed by hand, 0 means certainly pasted or generated.".to_string());
    lines.push("- Provide 1-5 short reasons grounded in the numbers below.".to_string());
    lines.push(
        "- Focus changes during editing are normal for people looking things up.".to_string(),
    );
    lines.push(String::new());
    lines.push(input.summary.clone());
    lines.push(String::new());
    lines.push(format!("rule_based_score: {}", input.baseline.score));
    if !input.baseline.reasons.is_empty() {
        lines.push("rule_based_reasons:".to_string());
        for reason in &input.baseline.reasons {
            lines.push(format!("- {reason}"));
        }
    }
    lines.join("\n")
}

fn parse_refinement(text: &str) -> Result<Refinement, LlmError> {
    #[derive(serde::Deserialize)]
    struct Payload {
        score: f64,
        reasons: Vec<String>,
    }

    let payload: Payload = serde_json::from_str(strip_code_fence(text))
        .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
    Ok(Refinement {
        score: payload.score,
        reasons: payload.reasons,
    })
}

/// Claude sometimes wraps JSON in a Markdown fence despite instructions.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
