//! Client for a hosted `generatePlan` endpoint.
//!
//! The endpoint takes the suggestion request body as-is and answers with
//! `{tasks: [...]}` on success or `{error: "..."}` on failure.

use crate::suggest::{
    parse_plan_payload, provider_error_message, SuggestionError, SuggestionRequest,
    SuggestionResult, SuggestionService,
};
use log::{error, info};
use std::time::{Duration, Instant};

pub struct HttpPlanService {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpPlanService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SuggestionService for HttpPlanService {
    fn name(&self) -> &str {
        "http_plan"
    }

    fn suggest(&self, request: &SuggestionRequest) -> SuggestionResult<Vec<String>> {
        let started_at = Instant::now();
        let result = post_plan(&self.agent, &self.endpoint, request);
        match &result {
            Ok(tasks) => info!(
                "event=suggest_request module=suggest provider=http_plan status=ok count={} duration_ms={}",
                tasks.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=suggest_request module=suggest provider=http_plan status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

fn post_plan(
    agent: &ureq::Agent,
    endpoint: &str,
    request: &SuggestionRequest,
) -> SuggestionResult<Vec<String>> {
    let response = agent
        .post(endpoint)
        .set("Content-Type", "application/json")
        .send_json(request)
        .map_err(map_ureq_error)?;
    let body = response
        .into_string()
        .map_err(|err| SuggestionError::Transport(err.to_string()))?;
    if let Some(message) = provider_error_message(&body) {
        return Err(SuggestionError::Provider {
            status: None,
            message,
        });
    }
    parse_plan_payload(&body)
}

/// Maps ureq failures; non-2xx bodies are searched for an `error` message.
pub(crate) fn map_ureq_error(err: ureq::Error) -> SuggestionError {
    match err {
        ureq::Error::Status(status, response) => {
            let fallback = response.status_text().to_string();
            let message = response
                .into_string()
                .ok()
                .and_then(|body| provider_error_message(&body))
                .unwrap_or(fallback);
            SuggestionError::Provider {
                status: Some(status),
                message,
            }
        }
        ureq::Error::Transport(transport) => SuggestionError::Transport(transport.to_string()),
    }
}
