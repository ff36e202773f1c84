//! Suggestion service contract and clients.
//!
//! # Responsibility
//! - Define the black-box "goal + tasks in, task texts out" provider seam.
//! - Parse and normalize provider payloads into plain task descriptions.
//!
//! # Invariants
//! - Only the sanitized projection (text, completed, priority, due date)
//!   leaves the process; ids, orders and estimates never do.
//! - A payload with no usable task text is an error, never an empty success.

use crate::model::task::{Priority, Task};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod http_service;
pub mod openai_service;
pub mod prompt;

pub use http_service::HttpPlanService;
pub use openai_service::OpenAiPlanService;

pub type SuggestionResult<T> = Result<T, SuggestionError>;

/// Sanitized view of one task sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            text: task.text.clone(),
            completed: task.completed,
            priority: task.priority,
            due_date: task.due_date,
        }
    }
}

/// Request body: `{goalText, tasks: [{text, completed, priority, dueDate}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub goal_text: String,
    pub tasks: Vec<TaskSummary>,
}

impl SuggestionRequest {
    pub fn new(goal_text: impl Into<String>, tasks: &[Task]) -> Self {
        Self {
            goal_text: goal_text.into(),
            tasks: tasks.iter().map(TaskSummary::from).collect(),
        }
    }
}

/// Provider failures (`SuggestionServiceError`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionError {
    /// Provider answered with a non-success status.
    Provider {
        status: Option<u16>,
        message: String,
    },
    /// Request never completed (DNS, connect, timeout).
    Transport(String),
    /// Payload is not `{tasks: [string, ...]}`.
    Malformed(String),
    /// Payload parsed but held no usable task text.
    Empty,
    /// Direct provider access configured without a key.
    MissingApiKey,
}

impl Display for SuggestionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider {
                status: Some(status),
                message,
            } => write!(f, "suggestion provider returned {status}: {message}"),
            Self::Provider {
                status: None,
                message,
            } => write!(f, "suggestion provider failed: {message}"),
            Self::Transport(message) => write!(f, "suggestion request failed: {message}"),
            Self::Malformed(message) => write!(f, "malformed suggestion payload: {message}"),
            Self::Empty => write!(f, "suggestion provider returned no tasks"),
            Self::MissingApiKey => write!(f, "suggestion provider API key is not configured"),
        }
    }
}

impl Error for SuggestionError {}

/// Black-box provider of replacement task lists.
pub trait SuggestionService: Send + Sync {
    /// Stable label used in logs.
    fn name(&self) -> &str;
    /// Returns suggested task texts in provider order.
    ///
    /// Callers trim the list and treat an empty result as `Empty`.
    fn suggest(&self, request: &SuggestionRequest) -> SuggestionResult<Vec<String>>;
}

/// Parses a `{tasks: [string, ...]}` body into normalized suggestions.
pub fn parse_plan_payload(body: &str) -> SuggestionResult<Vec<String>> {
    let value: Value = serde_json::from_str(body.trim())
        .map_err(|err| SuggestionError::Malformed(err.to_string()))?;
    let tasks = value
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or_else(|| SuggestionError::Malformed("missing `tasks` array".to_string()))?;

    let mut texts = Vec::with_capacity(tasks.len());
    for (index, item) in tasks.iter().enumerate() {
        let text = item.as_str().ok_or_else(|| {
            SuggestionError::Malformed(format!("tasks[{index}] is not a string"))
        })?;
        texts.push(text.to_string());
    }
    normalize_suggestions(texts)
}

/// Trims entries and drops blanks; an empty result is `Empty`.
pub fn normalize_suggestions(texts: Vec<String>) -> SuggestionResult<Vec<String>> {
    let normalized: Vec<String> = texts
        .into_iter()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    if normalized.is_empty() {
        return Err(SuggestionError::Empty);
    }
    Ok(normalized)
}

/// Pulls the provider's `error` message out of a failure body, if any.
pub fn provider_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskDraft;
    use serde_json::json;

    #[test]
    fn request_body_excludes_ids_orders_and_estimates() {
        let draft = TaskDraft::new("Outline chapter")
            .with_priority(Priority::High)
            .with_estimate(45);
        let task = Task::from_draft("doc-1".to_string(), &draft, 3, 10);
        let body = serde_json::to_value(SuggestionRequest::new("Write a book", &[task])).unwrap();
        assert_eq!(
            body,
            json!({
                "goalText": "Write a book",
                "tasks": [{
                    "text": "Outline chapter",
                    "completed": false,
                    "priority": "high",
                    "dueDate": null
                }]
            })
        );
    }

    #[test]
    fn parses_and_normalizes_task_lists() {
        let parsed = parse_plan_payload(r#"{"tasks": [" a ", "", "b"]}"#).unwrap();
        assert_eq!(parsed, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn rejects_wrong_shapes_and_empty_lists() {
        assert!(matches!(
            parse_plan_payload(r#"["a"]"#),
            Err(SuggestionError::Malformed(_))
        ));
        assert!(matches!(
            parse_plan_payload(r#"{"tasks": [1, 2]}"#),
            Err(SuggestionError::Malformed(_))
        ));
        assert_eq!(
            parse_plan_payload(r#"{"tasks": []}"#),
            Err(SuggestionError::Empty)
        );
        assert!(matches!(
            parse_plan_payload("not json"),
            Err(SuggestionError::Malformed(_))
        ));
    }

    #[test]
    fn extracts_provider_error_messages() {
        assert_eq!(
            provider_error_message(r#"{"error": "quota exceeded"}"#).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            provider_error_message(r#"{"error": {"message": "bad key"}}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(provider_error_message("<html>"), None);
    }
}
