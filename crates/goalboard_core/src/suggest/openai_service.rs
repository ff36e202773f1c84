//! Direct client for an OpenAI-compatible chat-completions endpoint.
//!
//! # Invariants
//! - No request is sent without an API key.
//! - The model is asked for a JSON object; content wrapped in a fenced code
//!   block is unwrapped before parsing.

use crate::suggest::http_service::map_ureq_error;
use crate::suggest::prompt::build_plan_prompt;
use crate::suggest::{
    parse_plan_payload, SuggestionError, SuggestionRequest, SuggestionResult, SuggestionService,
};
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;

static FENCED_JSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("fenced json regex must compile")
});

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct OpenAiPlanService {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiPlanService {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, api_key: &str, prompt: &str) -> SuggestionResult<Vec<String>> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let response: ChatResponse = self
            .agent
            .post(&format!("{}/chat/completions", self.base_url))
            .set("Authorization", &format!("Bearer {api_key}"))
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(map_ureq_error)?
            .into_json()
            .map_err(|err| SuggestionError::Malformed(err.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(SuggestionError::Empty)?;
        parse_plan_payload(unwrap_fenced_json(&content))
    }
}

impl SuggestionService for OpenAiPlanService {
    fn name(&self) -> &str {
        "openai"
    }

    fn suggest(&self, request: &SuggestionRequest) -> SuggestionResult<Vec<String>> {
        let Some(api_key) = self.api_key.as_deref() else {
            error!("event=suggest_request module=suggest provider=openai status=error error=missing_api_key");
            return Err(SuggestionError::MissingApiKey);
        };

        let started_at = Instant::now();
        let result = self.complete(api_key, &build_plan_prompt(request));
        match &result {
            Ok(tasks) => info!(
                "event=suggest_request module=suggest provider=openai status=ok model={} count={} duration_ms={}",
                self.model,
                tasks.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=suggest_request module=suggest provider=openai status=error model={} duration_ms={} error={}",
                self.model,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

/// Strips a surrounding ```` ```json ```` fence if present.
pub fn unwrap_fenced_json(content: &str) -> &str {
    match FENCED_JSON_RE.captures(content).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => content.trim(),
    }
}
