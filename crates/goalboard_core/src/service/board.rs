//! Goal board facade for the presentation layer.
//!
//! # Responsibility
//! - Bundle one goal's task store, view options and suggestion workflow.
//! - Expose the read model (display list + flags) and the command set.
//!
//! # Invariants
//! - Pending subscription events are reconciled before every read and after
//!   every command.
//! - Filter and sort only shape the display list; they never write.

use crate::model::goal::{Goal, GoalId, OwnerId};
use crate::model::task::{Task, TaskDraft, TaskId, TaskPatch};
use crate::service::goal_service::{GoalService, GoalServiceError};
use crate::service::ordering::{
    compute_display_list, reorder, PriorityFilter, SortMode, ViewOptions,
};
use crate::service::suggestion_flow::{SuggestionFlow, SuggestionFlowError, SuggestionState};
use crate::service::task_store::{TaskStore, TaskStoreError};
use crate::store::DocumentStore;
use crate::suggest::{SuggestionRequest, SuggestionService};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Snapshot of everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardView {
    pub goal_id: GoalId,
    /// Filtered and sorted tasks.
    pub tasks: Vec<Task>,
    /// Size of the unfiltered snapshot.
    pub total: usize,
    pub loading: bool,
    pub error: Option<String>,
    pub options: ViewOptions,
    /// Drag-reorder is only offered with no filter and custom sort.
    pub can_reorder: bool,
    pub suggestions: SuggestionState,
}

#[derive(Debug)]
pub enum BoardError {
    Tasks(TaskStoreError),
    Suggestions(SuggestionFlowError),
    Goal(GoalServiceError),
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tasks(err) => write!(f, "{err}"),
            Self::Suggestions(err) => write!(f, "{err}"),
            Self::Goal(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tasks(err) => Some(err),
            Self::Suggestions(err) => Some(err),
            Self::Goal(err) => Some(err),
        }
    }
}

impl From<TaskStoreError> for BoardError {
    fn from(value: TaskStoreError) -> Self {
        Self::Tasks(value)
    }
}

impl From<SuggestionFlowError> for BoardError {
    fn from(value: SuggestionFlowError) -> Self {
        Self::Suggestions(value)
    }
}

impl From<GoalServiceError> for BoardError {
    fn from(value: GoalServiceError) -> Self {
        Self::Goal(value)
    }
}

pub type BoardResult<T> = Result<T, BoardError>;

pub struct GoalBoard {
    goal_id: GoalId,
    tasks: TaskStore,
    goals: GoalService,
    flow: Arc<SuggestionFlow>,
    options: ViewOptions,
}

impl GoalBoard {
    /// Subscribes to `goal_id` of `owner_id` and returns a ready board.
    pub fn open(
        store: Arc<dyn DocumentStore>,
        suggestions: Arc<dyn SuggestionService>,
        owner_id: impl Into<OwnerId>,
        goal_id: impl Into<GoalId>,
    ) -> BoardResult<Self> {
        let owner_id = owner_id.into();
        let goal_id = goal_id.into();
        let mut tasks = TaskStore::new(store.clone(), owner_id.clone());
        tasks.subscribe(&goal_id)?;
        Ok(Self {
            goal_id,
            tasks,
            goals: GoalService::new(store, owner_id),
            flow: Arc::new(SuggestionFlow::new(suggestions)),
            options: ViewOptions::default(),
        })
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn view(&mut self) -> BoardView {
        self.tasks.sync();
        let all = self.tasks.tasks();
        BoardView {
            goal_id: self.goal_id.clone(),
            tasks: compute_display_list(all, self.options.filter, self.options.sort),
            total: all.len(),
            loading: self.tasks.is_loading(),
            error: self.tasks.last_error().map(str::to_string),
            options: self.options,
            can_reorder: self.options.check_reorder().is_ok(),
            suggestions: self.flow.state(),
        }
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    pub fn set_filter(&mut self, filter: PriorityFilter) {
        self.options.filter = filter;
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.options.sort = sort;
    }

    pub fn add_task(&mut self, draft: TaskDraft) -> BoardResult<Task> {
        self.tasks.sync();
        let result = self.tasks.add_task(draft);
        self.tasks.sync();
        Ok(result?)
    }

    pub fn toggle_task(&mut self, id: &str) -> BoardResult<bool> {
        self.tasks.sync();
        let result = self.tasks.toggle_completion(id);
        self.tasks.sync();
        Ok(result?)
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> BoardResult<()> {
        self.tasks.sync();
        let result = self.tasks.update_task(id, patch);
        self.tasks.sync();
        Ok(result?)
    }

    pub fn delete_task(&mut self, id: &str) -> BoardResult<()> {
        self.tasks.sync();
        let result = self.tasks.delete_task(id);
        self.tasks.sync();
        Ok(result?)
    }

    /// Applies a drag-reorder; `sequence` lists every task id in new order.
    pub fn reorder(&mut self, sequence: &[TaskId]) -> BoardResult<usize> {
        self.tasks.sync();
        let result = reorder(&mut self.tasks, &self.options, sequence);
        self.tasks.sync();
        Ok(result?)
    }

    pub fn save_goal(&mut self, text: &str) -> BoardResult<Goal> {
        Ok(self.goals.save_goal(&self.goal_id, text)?)
    }

    pub fn goal(&self) -> BoardResult<Option<Goal>> {
        Ok(self.goals.load_goal(&self.goal_id)?)
    }

    /// Builds the provider request from the saved goal and current tasks.
    ///
    /// A missing goal yields a blank goal text, which the workflow refuses.
    pub fn suggestion_request(&mut self) -> BoardResult<SuggestionRequest> {
        self.tasks.sync();
        let goal_text = self.goal()?.map(|goal| goal.text).unwrap_or_default();
        Ok(SuggestionRequest::new(goal_text, self.tasks.tasks()))
    }

    /// Shared handle for running a request off the caller's thread.
    pub fn suggestion_flow(&self) -> Arc<SuggestionFlow> {
        self.flow.clone()
    }

    pub fn request_suggestions(&mut self) -> BoardResult<Vec<String>> {
        let request = self.suggestion_request()?;
        Ok(self.flow.request_suggestions(&request)?)
    }

    pub fn accept_suggestions(&mut self) -> BoardResult<Vec<TaskId>> {
        self.tasks.sync();
        let result = self.flow.accept_staged(&mut self.tasks);
        self.tasks.sync();
        Ok(result?)
    }

    pub fn reject_suggestions(&mut self) -> BoardResult<()> {
        Ok(self.flow.reject_staged()?)
    }

    /// Stops the live subscription. Idempotent.
    pub fn close(&mut self) {
        self.tasks.unsubscribe();
    }
}
