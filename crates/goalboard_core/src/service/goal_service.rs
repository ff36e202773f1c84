//! Goal persistence use-cases.
//!
//! # Invariants
//! - Stored goal text is trimmed and non-empty.
//! - A goal document lives at `users/{owner}/goals/{goal}` with one `text`
//!   field; saving replaces it.

use crate::model::goal::{Goal, GoalId, OwnerId};
use crate::store::{BatchOp, CollectionPath, DocumentStore, Fields, StoreError};
use log::{error, info};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug)]
pub enum GoalServiceError {
    EmptyText,
    Store(StoreError),
}

impl Display for GoalServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "goal text must not be empty"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GoalServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::EmptyText => None,
        }
    }
}

impl From<StoreError> for GoalServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

pub struct GoalService {
    store: Arc<dyn DocumentStore>,
    owner_id: OwnerId,
}

impl GoalService {
    pub fn new(store: Arc<dyn DocumentStore>, owner_id: impl Into<OwnerId>) -> Self {
        Self {
            store,
            owner_id: owner_id.into(),
        }
    }

    /// Creates or replaces the goal text.
    pub fn save_goal(&self, goal_id: &str, text: &str) -> Result<Goal, GoalServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GoalServiceError::EmptyText);
        }
        let path = CollectionPath::goals(&self.owner_id)?.doc(goal_id)?;
        let mut fields = Fields::new();
        fields.insert("text".to_string(), json!(text));

        if let Err(err) = self.store.atomic_batch(vec![BatchOp::Set(path, fields)]) {
            error!(
                "event=goal_save module=goal_service status=error goal_id={} error={}",
                goal_id, err
            );
            return Err(err.into());
        }
        info!(
            "event=goal_save module=goal_service status=ok goal_id={}",
            goal_id
        );
        Ok(Goal {
            id: goal_id.to_string(),
            owner_id: self.owner_id.clone(),
            text: text.to_string(),
        })
    }

    /// Loads the goal, or `None` when it was never saved.
    pub fn load_goal(&self, goal_id: &str) -> Result<Option<Goal>, GoalServiceError> {
        let path = CollectionPath::goals(&self.owner_id)?.doc(goal_id)?;
        let Some(document) = self.store.get_document(&path)? else {
            return Ok(None);
        };
        let text = match document.fields.get("text") {
            Some(Value::String(text)) => text.clone(),
            _ => {
                return Err(StoreError::InvalidData(format!(
                    "goal `{goal_id}` has no text field"
                ))
                .into())
            }
        };
        Ok(Some(Goal {
            id: GoalId::from(goal_id),
            owner_id: self.owner_id.clone(),
            text,
        }))
    }
}
