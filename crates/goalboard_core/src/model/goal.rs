//! Goal domain model.
//!
//! A user has one active goal; the goal owns the task collection stored under
//! `users/{owner}/goals/{goal}/tasks`.

use serde::{Deserialize, Serialize};

pub type OwnerId = String;
pub type GoalId = String;

/// Goal id used when a user has never named one (single-goal model).
pub const DEFAULT_GOAL_ID: &str = "main";

/// Top-level objective a task collection is organized under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: GoalId,
    pub owner_id: OwnerId,
    /// Free-form goal description.
    pub text: String,
}
