//! Task store: the authoritative in-memory task list of the active goal.
//!
//! # Responsibility
//! - Own the local snapshot and keep it in step with the live subscription.
//! - Apply local mutations, optimistically where the operation calls for it.
//!
//! # Invariants
//! - The snapshot changes only through this type: reconciliation, optimistic
//!   apply, or rollback.
//! - The latest subscription snapshot always supersedes local state.
//! - `add_task` rolls its optimistic entry back on failure; toggle and edit do
//!   not (the next snapshot corrects them); delete is never optimistic.

use crate::model::task::{
    next_provisional_id, now_epoch_ms, Task, TaskDraft, TaskId, TaskPatch, TaskValidationError,
};
use crate::repo::task_repo::{decode_snapshot, TaskRepository};
use crate::service::ordering::next_order;
use crate::store::{CollectionEvent, CollectionPath, DocumentStore, StoreError, Subscription};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Why a reorder request was refused before any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderBlocked {
    /// A priority filter hides part of the list.
    FilterActive,
    /// The list is sorted by due date, not by custom order.
    SortedByDueDate,
}

impl Display for ReorderBlocked {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FilterActive => write!(f, "clear the priority filter to reorder tasks"),
            Self::SortedByDueDate => write!(f, "switch to custom order to reorder tasks"),
        }
    }
}

/// Task store failures.
#[derive(Debug)]
pub enum TaskStoreError {
    /// Bad local input; nothing was sent.
    Validation(TaskValidationError),
    /// Operation not allowed in the current view; nothing was sent.
    Precondition(ReorderBlocked),
    /// No goal is subscribed.
    NotSubscribed,
    /// Id is not in the local snapshot.
    TaskNotFound(TaskId),
    /// Reorder sequence is not a permutation of the current task ids.
    SequenceMismatch { expected: usize, actual: usize },
    /// Remote write or batch failed.
    Store(StoreError),
}

impl Display for TaskStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Precondition(reason) => write!(f, "reorder not allowed: {reason}"),
            Self::NotSubscribed => write!(f, "no goal is subscribed"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::SequenceMismatch { expected, actual } => write!(
                f,
                "reorder sequence must list each of the {expected} task(s) exactly once, got {actual} id(s)"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for TaskStoreError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for TaskStoreError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

struct ActiveGoal {
    goal_id: String,
    repo: TaskRepository,
    subscription: Subscription,
}

/// Owner of one user's live task list.
pub struct TaskStore {
    store: Arc<dyn DocumentStore>,
    owner_id: String,
    active: Option<ActiveGoal>,
    tasks: Vec<Task>,
    loading: bool,
    last_error: Option<String>,
}

impl TaskStore {
    pub fn new(store: Arc<dyn DocumentStore>, owner_id: impl Into<String>) -> Self {
        Self {
            store,
            owner_id: owner_id.into(),
            active: None,
            tasks: Vec::new(),
            loading: false,
            last_error: None,
        }
    }

    /// Opens the live subscription for `goal_id`, replacing any previous one.
    ///
    /// The snapshot is empty and `is_loading()` is true until the first
    /// event is reconciled.
    pub fn subscribe(&mut self, goal_id: &str) -> TaskStoreResult<()> {
        self.unsubscribe();
        let collection = CollectionPath::tasks(&self.owner_id, goal_id)?;
        let repo = TaskRepository::new(self.store.clone(), collection);
        let subscription = repo.subscribe()?;
        info!(
            "event=tasks_subscribe module=task_store status=ok goal_id={}",
            goal_id
        );
        self.active = Some(ActiveGoal {
            goal_id: goal_id.to_string(),
            repo,
            subscription,
        });
        self.loading = true;
        self.sync();
        Ok(())
    }

    /// Closes the subscription and drops local state. Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(active) = self.active.take() {
            active.subscription.cancel();
            info!(
                "event=tasks_unsubscribe module=task_store status=ok goal_id={}",
                active.goal_id
            );
        }
        self.tasks.clear();
        self.loading = false;
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    pub fn goal_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.goal_id.as_str())
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Reconciles every queued subscription event; returns how many ran.
    pub fn sync(&mut self) -> usize {
        let events = match &self.active {
            Some(active) => active.subscription.drain(),
            None => return 0,
        };
        let count = events.len();
        for event in events {
            self.reconcile(event);
        }
        count
    }

    /// Waits up to `timeout` for one event, then reconciles the rest.
    pub fn sync_blocking(&mut self, timeout: Duration) -> usize {
        let first = match &self.active {
            Some(active) => active.subscription.next_timeout(timeout),
            None => return 0,
        };
        match first {
            Some(event) => {
                self.reconcile(event);
                1 + self.sync()
            }
            None => 0,
        }
    }

    fn reconcile(&mut self, event: CollectionEvent) {
        match event {
            CollectionEvent::Snapshot(documents) => match decode_snapshot(&documents) {
                Ok(tasks) => {
                    debug!(
                        "event=tasks_reconcile module=task_store status=ok count={}",
                        tasks.len()
                    );
                    self.tasks = tasks;
                    self.loading = false;
                    self.last_error = None;
                }
                Err(err) => {
                    warn!(
                        "event=tasks_reconcile module=task_store status=error error={}",
                        err
                    );
                    self.loading = false;
                    self.last_error = Some(err.to_string());
                }
            },
            CollectionEvent::Error(message) => {
                warn!(
                    "event=tasks_reconcile module=task_store status=error error={}",
                    message
                );
                self.loading = false;
                self.last_error = Some(message);
            }
        }
    }

    /// Current snapshot in `order` sequence.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Last reconciliation or write failure, cleared by the next good snapshot.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Adds a task at the end of the custom order.
    ///
    /// The task is visible locally before the remote write returns and is
    /// removed again if the write fails.
    pub fn add_task(&mut self, draft: TaskDraft) -> TaskStoreResult<Task> {
        let draft = draft.normalized()?;
        let repo = self.repo()?.clone();

        let provisional_id = next_provisional_id();
        let task = Task::from_draft(
            provisional_id.clone(),
            &draft,
            next_order(&self.tasks),
            now_epoch_ms(),
        );
        self.tasks.push(task.clone());

        let started_at = Instant::now();
        match repo.create(&task) {
            Ok(id) => {
                info!(
                    "event=task_add module=task_store status=ok task_id={} order={} duration_ms={}",
                    id,
                    task.order,
                    started_at.elapsed().as_millis()
                );
                let persisted = Task { id, ..task };
                if let Some(entry) = self.tasks.iter_mut().find(|t| t.id == provisional_id) {
                    *entry = persisted.clone();
                }
                Ok(persisted)
            }
            Err(err) => {
                error!(
                    "event=task_add module=task_store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                self.tasks.retain(|t| t.id != provisional_id);
                self.last_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Flips `completed`; returns the new value.
    ///
    /// A failed write is reported but the local flip stays until the next
    /// snapshot replaces it.
    pub fn toggle_completion(&mut self, id: &str) -> TaskStoreResult<bool> {
        let repo = self.repo()?.clone();
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| TaskStoreError::TaskNotFound(id.to_string()))?;
        task.completed = !task.completed;
        let completed = task.completed;

        self.settle_without_rollback("task_toggle", id, repo.set_completed(id, completed))?;
        Ok(completed)
    }

    /// Edits text, priority, due date or estimate. `order` is untouched.
    ///
    /// Same settlement policy as [`TaskStore::toggle_completion`].
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> TaskStoreResult<()> {
        let patch = patch.normalized()?;
        if patch.is_empty() {
            return Ok(());
        }
        let repo = self.repo()?.clone();
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| TaskStoreError::TaskNotFound(id.to_string()))?;
        patch.apply_to(task);

        self.settle_without_rollback("task_update", id, repo.apply_patch(id, &patch))
    }

    /// Deletes remotely; the local entry disappears with the next snapshot.
    pub fn delete_task(&mut self, id: &str) -> TaskStoreResult<()> {
        let repo = self.repo()?.clone();
        if self.task(id).is_none() {
            return Err(TaskStoreError::TaskNotFound(id.to_string()));
        }
        self.settle_without_rollback("task_delete", id, repo.delete(id))
    }

    pub(crate) fn repo(&self) -> TaskStoreResult<&TaskRepository> {
        self.active
            .as_ref()
            .map(|active| &active.repo)
            .ok_or(TaskStoreError::NotSubscribed)
    }

    /// Replaces the local sequence during an optimistic multi-task change.
    pub(crate) fn replace_local(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    fn settle_without_rollback(
        &mut self,
        event: &str,
        id: &str,
        result: Result<(), StoreError>,
    ) -> TaskStoreResult<()> {
        match result {
            Ok(()) => {
                info!("event={event} module=task_store status=ok task_id={id}");
                Ok(())
            }
            Err(err) => {
                error!("event={event} module=task_store status=error task_id={id} error={err}");
                self.last_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }
}
