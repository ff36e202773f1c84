//! Task domain model.
//!
//! # Responsibility
//! - Define the task record shared by the task store, ordering engine and
//!   suggestion workflow.
//! - Validate user input (drafts and patches) before any I/O happens.
//!
//! # Invariants
//! - `text` is trimmed and never empty.
//! - `order` is the only field rewritten in bulk; edits never touch it.
//! - `created_at` is set once at creation and never mutated.
//! - Provisional ids live in the `local:` namespace, disjoint from store ids.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque task identifier assigned by the document store.
pub type TaskId = String;

/// Prefix reserved for client-generated ids that the store never assigns.
pub const PROVISIONAL_ID_PREFIX: &str = "local:";

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

static PROVISIONAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Stable wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parses a wire label, case-insensitive.
    pub fn parse(value: &str) -> Result<Self, TaskValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(TaskValidationError::UnknownPriority(value.to_string())),
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Validation failures for task input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Text is empty after trimming.
    EmptyText,
    /// Estimated minutes below zero.
    NegativeEstimate(i64),
    /// Due date is not a `YYYY-MM-DD` calendar date.
    InvalidDueDate(String),
    /// Priority label is not `high|medium|low`.
    UnknownPriority(String),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "task text must not be empty"),
            Self::NegativeEstimate(value) => {
                write!(f, "estimated time must not be negative, got {value}")
            }
            Self::InvalidDueDate(value) => {
                write!(f, "due date must be YYYY-MM-DD, got `{value}`")
            }
            Self::UnknownPriority(value) => {
                write!(f, "priority must be high|medium|low, got `{value}`")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// One task in a goal's collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub estimated_time_minutes: u32,
    /// Custom display position; unique within the goal.
    pub order: i64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Task {
    /// Builds a not-yet-persisted task from a normalized draft.
    pub fn from_draft(id: TaskId, draft: &TaskDraft, order: i64, created_at: i64) -> Self {
        Self {
            id,
            text: draft.text.clone(),
            completed: false,
            priority: draft.priority,
            due_date: draft.due_date,
            estimated_time_minutes: draft.estimated_time_minutes,
            order,
            created_at,
        }
    }

    /// Checks record-level invariants.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.text.trim().is_empty() {
            return Err(TaskValidationError::EmptyText);
        }
        Ok(())
    }

    /// Whether the id is a client-side placeholder.
    pub fn is_provisional(&self) -> bool {
        is_provisional_id(&self.id)
    }
}

/// User input for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub text: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub estimated_time_minutes: u32,
}

impl TaskDraft {
    /// Draft with default priority, no due date and no estimate.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: Priority::default(),
            due_date: None,
            estimated_time_minutes: 0,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn with_estimate(mut self, minutes: u32) -> Self {
        self.estimated_time_minutes = minutes;
        self
    }

    /// Returns a copy with trimmed text, or `EmptyText`.
    pub fn normalized(&self) -> Result<Self, TaskValidationError> {
        let text = normalize_text(&self.text)?;
        Ok(Self {
            text,
            ..self.clone()
        })
    }
}

/// Partial edit of the independently mutable task fields.
///
/// `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub estimated_time_minutes: Option<u32>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.estimated_time_minutes.is_none()
    }

    /// Returns a copy with trimmed text, or `EmptyText`.
    pub fn normalized(&self) -> Result<Self, TaskValidationError> {
        let text = match &self.text {
            Some(value) => Some(normalize_text(value)?),
            None => None,
        };
        Ok(Self {
            text,
            ..self.clone()
        })
    }

    /// Applies present fields to `task`; `order` is never touched.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(minutes) = self.estimated_time_minutes {
            task.estimated_time_minutes = minutes;
        }
    }
}

/// Parses a `YYYY-MM-DD` due date. Blank input means "no due date".
pub fn parse_due_date(value: &str) -> Result<Option<NaiveDate>, TaskValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, DUE_DATE_FORMAT)
        .map(Some)
        .map_err(|_| TaskValidationError::InvalidDueDate(trimmed.to_string()))
}

/// Converts a signed estimate from an outer layer into minutes.
pub fn parse_estimate(minutes: i64) -> Result<u32, TaskValidationError> {
    u32::try_from(minutes).map_err(|_| TaskValidationError::NegativeEstimate(minutes))
}

/// Generates a provisional id in the reserved `local:` namespace.
pub fn next_provisional_id() -> TaskId {
    let seq = PROVISIONAL_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{PROVISIONAL_ID_PREFIX}{}-{seq}", now_epoch_ms())
}

pub fn is_provisional_id(id: &str) -> bool {
    id.starts_with(PROVISIONAL_ID_PREFIX)
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn normalize_text(value: &str) -> Result<String, TaskValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TaskValidationError::EmptyText);
    }
    Ok(trimmed.to_string())
}
