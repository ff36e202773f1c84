//! Suggestion adoption workflow.
//!
//! # Responsibility
//! - Drive one request to the suggestion service at a time.
//! - Hold the proposed task texts until the user accepts or rejects them.
//! - Commit an accepted proposal as one atomic replace of the task collection.
//!
//! # Invariants
//! - States move `Idle -> Requesting -> Staged | Failed` and
//!   `Staged -> Idle | Committing -> Idle | Failed`; anything else is refused.
//! - While `Requesting`, a second request fails at once and sends nothing.
//! - The state lock is never held across service or store I/O.

use crate::model::task::TaskId;
use crate::service::ordering::replace_with_suggestions;
use crate::service::task_store::{TaskStore, TaskStoreError};
use crate::suggest::{
    normalize_suggestions, SuggestionError, SuggestionRequest, SuggestionService,
};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Where the workflow currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SuggestionState {
    #[default]
    Idle,
    Requesting,
    /// Proposal waiting for accept or reject, in service order.
    Staged(Vec<String>),
    Committing,
    /// Last request or commit failed; a new request may be made.
    Failed(String),
}

impl SuggestionState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Staged(_) => "staged",
            Self::Committing => "committing",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
pub enum SuggestionFlowError {
    /// A request is already outstanding.
    AlreadyInFlight,
    /// The action is not valid from the current state.
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    /// Goal text is blank; nothing was sent.
    EmptyGoal,
    /// The suggestion service failed.
    Service(SuggestionError),
    /// The replacement batch failed; the prior tasks remain.
    Commit(TaskStoreError),
}

impl Display for SuggestionFlowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInFlight => write!(f, "a suggestion request is already in progress"),
            Self::InvalidTransition { action, state } => {
                write!(f, "cannot {action} while suggestions are {state}")
            }
            Self::EmptyGoal => write!(f, "set a goal before asking for suggestions"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Commit(err) => write!(f, "applying suggestions failed: {err}"),
        }
    }
}

impl Error for SuggestionFlowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Service(err) => Some(err),
            Self::Commit(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SuggestionError> for SuggestionFlowError {
    fn from(value: SuggestionError) -> Self {
        Self::Service(value)
    }
}

impl From<TaskStoreError> for SuggestionFlowError {
    fn from(value: TaskStoreError) -> Self {
        Self::Commit(value)
    }
}

/// Single-flight suggestion workflow for one goal.
///
/// Shared by reference; `request_suggestions` may run on another thread
/// while the caller keeps reading `state()`.
pub struct SuggestionFlow {
    service: Arc<dyn SuggestionService>,
    state: Mutex<SuggestionState>,
}

impl SuggestionFlow {
    pub fn new(service: Arc<dyn SuggestionService>) -> Self {
        Self {
            service,
            state: Mutex::new(SuggestionState::Idle),
        }
    }

    pub fn state(&self) -> SuggestionState {
        self.lock_state().clone()
    }

    pub fn staged(&self) -> Option<Vec<String>> {
        match &*self.lock_state() {
            SuggestionState::Staged(tasks) => Some(tasks.clone()),
            _ => None,
        }
    }

    pub fn is_requesting(&self) -> bool {
        *self.lock_state() == SuggestionState::Requesting
    }

    /// Asks the service for a replacement task list and stages it.
    ///
    /// Allowed from `Idle` and `Failed`. Returns the staged texts, trimmed.
    /// A reply with no usable text moves the flow to `Failed`.
    pub fn request_suggestions(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Vec<String>, SuggestionFlowError> {
        if request.goal_text.trim().is_empty() {
            return Err(SuggestionFlowError::EmptyGoal);
        }
        {
            let mut state = self.lock_state();
            match &*state {
                SuggestionState::Idle | SuggestionState::Failed(_) => {}
                SuggestionState::Requesting => {
                    warn!("event=suggest_flow_request module=suggestion_flow status=rejected reason=in_flight");
                    return Err(SuggestionFlowError::AlreadyInFlight);
                }
                other => {
                    return Err(SuggestionFlowError::InvalidTransition {
                        action: "request suggestions",
                        state: other.label(),
                    })
                }
            }
            *state = SuggestionState::Requesting;
        }

        let started_at = Instant::now();
        // Blank entries are dropped; nothing left to stage is `Empty`.
        let result = self.service.suggest(request).and_then(normalize_suggestions);
        let mut state = self.lock_state();
        match result {
            Ok(tasks) => {
                info!(
                    "event=suggest_flow_request module=suggestion_flow status=ok provider={} count={} duration_ms={}",
                    self.service.name(),
                    tasks.len(),
                    started_at.elapsed().as_millis()
                );
                *state = SuggestionState::Staged(tasks.clone());
                Ok(tasks)
            }
            Err(err) => {
                error!(
                    "event=suggest_flow_request module=suggestion_flow status=error provider={} duration_ms={} error={}",
                    self.service.name(),
                    started_at.elapsed().as_millis(),
                    err
                );
                *state = SuggestionState::Failed(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Replaces every task of `store` with the staged proposal.
    ///
    /// The staged list is consumed whether or not the batch succeeds.
    pub fn accept_staged(&self, store: &mut TaskStore) -> Result<Vec<TaskId>, SuggestionFlowError> {
        let staged = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, SuggestionState::Committing) {
                SuggestionState::Staged(tasks) => tasks,
                previous => {
                    let label = previous.label();
                    *state = previous;
                    return Err(SuggestionFlowError::InvalidTransition {
                        action: "accept suggestions",
                        state: label,
                    });
                }
            }
        };

        let result = replace_with_suggestions(store, &staged);
        let mut state = self.lock_state();
        match result {
            Ok(ids) => {
                info!(
                    "event=suggest_flow_accept module=suggestion_flow status=ok count={}",
                    ids.len()
                );
                *state = SuggestionState::Idle;
                Ok(ids)
            }
            Err(err) => {
                error!(
                    "event=suggest_flow_accept module=suggestion_flow status=error error={}",
                    err
                );
                *state = SuggestionState::Failed(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Drops the staged proposal without touching the store.
    pub fn reject_staged(&self) -> Result<(), SuggestionFlowError> {
        let mut state = self.lock_state();
        match &*state {
            SuggestionState::Staged(tasks) => {
                info!(
                    "event=suggest_flow_reject module=suggestion_flow status=ok count={}",
                    tasks.len()
                );
                *state = SuggestionState::Idle;
                Ok(())
            }
            other => Err(SuggestionFlowError::InvalidTransition {
                action: "reject suggestions",
                state: other.label(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SuggestionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggest::SuggestionResult;

    struct Fixed(SuggestionResult<Vec<String>>);

    impl SuggestionService for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn suggest(&self, _request: &SuggestionRequest) -> SuggestionResult<Vec<String>> {
            self.0.clone()
        }
    }

    fn flow(result: SuggestionResult<Vec<String>>) -> SuggestionFlow {
        SuggestionFlow::new(Arc::new(Fixed(result)))
    }

    #[test]
    fn successful_request_stages_and_reject_returns_to_idle() {
        let flow = flow(Ok(vec!["a".to_string(), "b".to_string()]));
        let staged = flow
            .request_suggestions(&SuggestionRequest::new("goal", &[]))
            .unwrap();
        assert_eq!(staged.len(), 2);
        assert_eq!(flow.state(), SuggestionState::Staged(staged));

        flow.reject_staged().unwrap();
        assert_eq!(flow.state(), SuggestionState::Idle);
        assert!(matches!(
            flow.reject_staged(),
            Err(SuggestionFlowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn failure_is_recorded_and_retry_is_allowed() {
        let flow = flow(Err(SuggestionError::Empty));
        let err = flow
            .request_suggestions(&SuggestionRequest::new("goal", &[]))
            .unwrap_err();
        assert!(matches!(err, SuggestionFlowError::Service(SuggestionError::Empty)));
        assert!(matches!(flow.state(), SuggestionState::Failed(_)));

        assert!(flow
            .request_suggestions(&SuggestionRequest::new("goal", &[]))
            .is_err());
        assert!(matches!(flow.state(), SuggestionState::Failed(_)));
    }

    #[test]
    fn blank_goal_is_rejected_without_state_change() {
        let flow = flow(Ok(vec!["a".to_string()]));
        assert!(matches!(
            flow.request_suggestions(&SuggestionRequest::new("   ", &[])),
            Err(SuggestionFlowError::EmptyGoal)
        ));
        assert_eq!(flow.state(), SuggestionState::Idle);
    }

    #[test]
    fn staged_proposal_blocks_a_new_request() {
        let flow = flow(Ok(vec!["a".to_string()]));
        flow.request_suggestions(&SuggestionRequest::new("goal", &[]))
            .unwrap();
        assert!(matches!(
            flow.request_suggestions(&SuggestionRequest::new("goal", &[])),
            Err(SuggestionFlowError::InvalidTransition { state: "staged", .. })
        ));
    }
}
