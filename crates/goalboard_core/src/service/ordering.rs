//! Reconciliation and ordering engine.
//!
//! # Responsibility
//! - Derive the display list from the task snapshot (filter + sort).
//! - Rewrite `order` on drag-reorder with one atomic batch.
//! - Replace the whole collection with accepted suggestions in one batch.
//!
//! # Invariants
//! - New orders are always strictly above the current maximum (0 when empty).
//! - Reorder only runs with no filter and custom sort; otherwise it is refused
//!   before any I/O.
//! - A failed reorder batch restores the exact pre-reorder snapshot.
//! - Display derivation never touches `order`.

use crate::model::task::{now_epoch_ms, Priority, Task, TaskDraft, TaskId};
use crate::service::task_store::{ReorderBlocked, TaskStore, TaskStoreError, TaskStoreResult};
use log::{error, info};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Priority filter applied to the display list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    /// Parses `all|high|medium|low`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Some(Self::All),
            other => Priority::parse(other).ok().map(Self::Only),
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Only(priority) => task.priority == priority,
        }
    }
}

impl Display for PriorityFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(priority) => write!(f, "{priority}"),
        }
    }
}

/// Sort applied to the display list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Store order (`order` ascending).
    #[default]
    Custom,
    /// Due date ascending, undated tasks last.
    DueDate,
}

impl SortMode {
    /// Parses `custom|dueDate` (also `due_date`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "custom" => Some(Self::Custom),
            "duedate" | "due_date" => Some(Self::DueDate),
            _ => None,
        }
    }
}

impl Display for SortMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Custom => f.write_str("custom"),
            Self::DueDate => f.write_str("dueDate"),
        }
    }
}

/// Filter and sort chosen by the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub filter: PriorityFilter,
    pub sort: SortMode,
}

impl ViewOptions {
    /// `Ok` when drag-reorder is meaningful in this view.
    pub fn check_reorder(&self) -> Result<(), ReorderBlocked> {
        if self.filter != PriorityFilter::All {
            return Err(ReorderBlocked::FilterActive);
        }
        if self.sort != SortMode::Custom {
            return Err(ReorderBlocked::SortedByDueDate);
        }
        Ok(())
    }
}

/// Derives the visible list. Pure; the input keeps its order values.
pub fn compute_display_list(tasks: &[Task], filter: PriorityFilter, sort: SortMode) -> Vec<Task> {
    let mut visible: Vec<Task> = tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect();
    if sort == SortMode::DueDate {
        // `sort_by` is stable, so undated tasks keep their relative order.
        visible.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
    }
    visible
}

/// Order for a task appended after `tasks`.
pub fn next_order(tasks: &[Task]) -> i64 {
    tasks
        .iter()
        .map(|task| task.order)
        .max()
        .map_or(0, |max| max + 1)
}

/// Maps `sequence` onto `order = index` and returns only the changed pairs.
///
/// `sequence` must name every task in `tasks` exactly once.
pub fn sequence_orders(tasks: &[Task], sequence: &[TaskId]) -> TaskStoreResult<Vec<(TaskId, i64)>> {
    let mismatch = || TaskStoreError::SequenceMismatch {
        expected: tasks.len(),
        actual: sequence.len(),
    };
    if sequence.len() != tasks.len() {
        return Err(mismatch());
    }

    let current: HashMap<&str, i64> = tasks
        .iter()
        .map(|task| (task.id.as_str(), task.order))
        .collect();
    let mut seen = HashSet::with_capacity(sequence.len());
    let mut changed = Vec::new();
    for (index, id) in sequence.iter().enumerate() {
        let Some(&order) = current.get(id.as_str()) else {
            return Err(TaskStoreError::TaskNotFound(id.clone()));
        };
        if !seen.insert(id.as_str()) {
            return Err(mismatch());
        }
        let target = index as i64;
        if order != target {
            changed.push((id.clone(), target));
        }
    }
    Ok(changed)
}

/// Rewrites the custom order to follow `sequence`.
///
/// The local snapshot is updated first; if the batch fails it is restored
/// and the error returned. Returns the number of tasks whose order changed.
pub fn reorder(
    store: &mut TaskStore,
    view: &ViewOptions,
    sequence: &[TaskId],
) -> TaskStoreResult<usize> {
    view.check_reorder().map_err(TaskStoreError::Precondition)?;
    let repo = store.repo()?.clone();

    let before = store.tasks().to_vec();
    let changed = sequence_orders(&before, sequence)?;
    if changed.is_empty() {
        return Ok(0);
    }

    let mut after = before.clone();
    for task in &mut after {
        if let Some((_, order)) = changed.iter().find(|(id, _)| *id == task.id) {
            task.order = *order;
        }
    }
    after.sort_by_key(|task| task.order);
    store.replace_local(after);

    let started_at = Instant::now();
    match repo.write_orders(&changed) {
        Ok(()) => {
            info!(
                "event=tasks_reorder module=ordering status=ok changed={} duration_ms={}",
                changed.len(),
                started_at.elapsed().as_millis()
            );
            Ok(changed.len())
        }
        Err(err) => {
            error!(
                "event=tasks_reorder module=ordering status=error changed={} duration_ms={} error={}",
                changed.len(),
                started_at.elapsed().as_millis(),
                err
            );
            store.replace_local(before);
            store.record_error(err.to_string());
            Err(err.into())
        }
    }
}

/// Deletes every current task and inserts one task per suggestion, atomically.
///
/// New tasks get default fields and contiguous orders starting above the
/// previous maximum. The local snapshot is left to the next subscription
/// event. Returns the ids of the inserted tasks.
pub fn replace_with_suggestions(
    store: &mut TaskStore,
    suggestions: &[String],
) -> TaskStoreResult<Vec<TaskId>> {
    let repo = store.repo()?.clone();

    let removed: Vec<TaskId> = store
        .tasks()
        .iter()
        .filter(|task| !task.is_provisional())
        .map(|task| task.id.clone())
        .collect();
    let first_order = next_order(store.tasks());
    let created_at = now_epoch_ms();

    let mut inserted = Vec::with_capacity(suggestions.len());
    for (offset, text) in suggestions.iter().enumerate() {
        let draft = TaskDraft::new(text.as_str()).normalized()?;
        inserted.push(Task::from_draft(
            repo.reserve_id(),
            &draft,
            first_order + offset as i64,
            created_at,
        ));
    }

    let started_at = Instant::now();
    match repo.replace_all(&removed, &inserted) {
        Ok(()) => {
            info!(
                "event=tasks_replace module=ordering status=ok removed={} inserted={} duration_ms={}",
                removed.len(),
                inserted.len(),
                started_at.elapsed().as_millis()
            );
            Ok(inserted.into_iter().map(|task| task.id).collect())
        }
        Err(err) => {
            error!(
                "event=tasks_replace module=ordering status=error removed={} inserted={} duration_ms={} error={}",
                removed.len(),
                inserted.len(),
                started_at.elapsed().as_millis(),
                err
            );
            store.record_error(err.to_string());
            Err(err.into())
        }
    }
}
