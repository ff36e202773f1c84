//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level board functions to Dart via FRB.
//! - Translate core errors into plain response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - One board is open per process; opening again replaces it.
//! - The board lock is released before a suggestion request goes out, so
//!   other commands and a rejected second request never wait on the provider.

use goalboard_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, parse_due_date,
    parse_estimate, ping as ping_inner, BoardView, CoreConfig, GoalBoard, Priority,
    PriorityFilter, SortMode, SqliteDocumentStore, SuggestionState, Task, TaskDraft, TaskPatch,
};
use log::warn;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

const BOARD_DB_FILE_NAME: &str = "goalboard.sqlite3";

static BOARD: Mutex<Option<GoalBoard>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One task row as rendered by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
    /// `high|medium|low`.
    pub priority: String,
    /// `YYYY-MM-DD`.
    pub due_date: Option<String>,
    pub estimated_time_minutes: u32,
    pub order: i64,
}

/// Read model of the open board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardViewResponse {
    pub ok: bool,
    pub goal_id: String,
    /// Filtered and sorted display list.
    pub tasks: Vec<TaskItem>,
    pub total: u32,
    pub loading: bool,
    pub error: Option<String>,
    /// `all|high|medium|low`.
    pub filter: String,
    /// `custom|dueDate`.
    pub sort: String,
    pub can_reorder: bool,
    /// `idle|requesting|staged|committing|failed`.
    pub suggestion_state: String,
    pub staged_suggestions: Vec<String>,
    pub suggestion_error: Option<String>,
    pub message: String,
}

impl BoardViewResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            goal_id: String::new(),
            tasks: Vec::new(),
            total: 0,
            loading: false,
            error: None,
            filter: PriorityFilter::All.to_string(),
            sort: SortMode::Custom.to_string(),
            can_reorder: false,
            suggestion_state: SuggestionState::Idle.label().to_string(),
            staged_suggestions: Vec::new(),
            suggestion_error: None,
            message: message.into(),
        }
    }
}

/// Generic command envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardActionResponse {
    pub ok: bool,
    /// Affected task id, when the command targets or creates one.
    pub task_id: Option<String>,
    pub message: String,
}

impl BoardActionResponse {
    fn success(message: impl Into<String>, task_id: Option<String>) -> Self {
        Self {
            ok: true,
            task_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_id: None,
            message: message.into(),
        }
    }
}

/// Suggestion request/accept envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionResponse {
    pub ok: bool,
    /// Staged texts after a request, created task ids after an accept.
    pub items: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalResponse {
    pub ok: bool,
    pub text: Option<String>,
    pub message: String,
}

/// Configured database file, or `goalboard.sqlite3` in the temp directory.
fn board_db_path(config: &CoreConfig) -> PathBuf {
    config
        .db_path
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(BOARD_DB_FILE_NAME))
}

/// Opens the board for `owner_id`/`goal_id`, replacing any open one.
///
/// Blank `db_path` falls back to `GOALBOARD_DB_PATH`, then to a file in the
/// temp directory. Blank `goal_id` uses the configured default. Suggestion
/// provider and logging settings come from `GOALBOARD_*` environment
/// variables; `GOALBOARD_LOG_DIR` turns file logging on.
#[flutter_rust_bridge::frb(sync)]
pub fn board_open(db_path: String, owner_id: String, goal_id: String) -> BoardActionResponse {
    let mut config = CoreConfig::default();
    config.apply_env(|key| std::env::var(key).ok());
    if !owner_id.trim().is_empty() {
        config.owner_id = owner_id.trim().to_string();
    }
    if !goal_id.trim().is_empty() {
        config.goal_id = goal_id.trim().to_string();
    }
    if !db_path.trim().is_empty() {
        config.db_path = Some(PathBuf::from(db_path.trim()));
    }
    if let Err(err) = config.validate() {
        return BoardActionResponse::failure(format!("board_open failed: {err}"));
    }
    // A host that already called `init_logging` with other settings keeps them.
    if let Err(err) = config.start_logging() {
        warn!("event=board_open module=ffi status=logging_skipped error={err}");
    }

    let path = board_db_path(&config);
    let store = match SqliteDocumentStore::open(&path) {
        Ok(store) => Arc::new(store),
        Err(err) => return BoardActionResponse::failure(format!("board_open failed: {err}")),
    };
    let board = match GoalBoard::open(
        store,
        config.build_suggestion_service(),
        config.owner_id.clone(),
        config.goal_id.clone(),
    ) {
        Ok(board) => board,
        Err(err) => return BoardActionResponse::failure(format!("board_open failed: {err}")),
    };

    let mut slot = lock_board();
    if let Some(mut previous) = slot.take() {
        previous.close();
    }
    *slot = Some(board);
    BoardActionResponse::success("Board opened.", None)
}

/// Closes the open board. Idempotent.
#[flutter_rust_bridge::frb(sync)]
pub fn board_close() -> BoardActionResponse {
    if let Some(mut board) = lock_board().take() {
        board.close();
    }
    BoardActionResponse::success("Board closed.", None)
}

/// Returns the current display list and flags.
#[flutter_rust_bridge::frb(sync)]
pub fn board_view() -> BoardViewResponse {
    match with_board(|board| Ok::<_, String>(board.view())) {
        Ok(view) => to_view_response(view),
        Err(message) => BoardViewResponse::failure(format!("board_view failed: {message}")),
    }
}

/// Adds a task at the end of the custom order.
///
/// `priority` accepts `high|medium|low` (default medium); `due_date` accepts
/// `YYYY-MM-DD` or blank.
#[flutter_rust_bridge::frb(sync)]
pub fn board_add_task(
    text: String,
    priority: Option<String>,
    due_date: Option<String>,
    estimated_time_minutes: Option<i64>,
) -> BoardActionResponse {
    let draft = match build_draft(text, priority, due_date, estimated_time_minutes) {
        Ok(draft) => draft,
        Err(message) => {
            return BoardActionResponse::failure(format!("board_add_task failed: {message}"))
        }
    };
    match with_board(|board| board.add_task(draft)) {
        Ok(task) => BoardActionResponse::success("Task added.", Some(task.id)),
        Err(message) => BoardActionResponse::failure(format!("board_add_task failed: {message}")),
    }
}

/// Edits the given fields; `None` leaves a field unchanged and a blank
/// `due_date` clears it.
#[flutter_rust_bridge::frb(sync)]
pub fn board_update_task(
    task_id: String,
    text: Option<String>,
    priority: Option<String>,
    due_date: Option<String>,
    estimated_time_minutes: Option<i64>,
) -> BoardActionResponse {
    let patch = match build_patch(text, priority, due_date, estimated_time_minutes) {
        Ok(patch) => patch,
        Err(message) => {
            return BoardActionResponse::failure(format!("board_update_task failed: {message}"))
        }
    };
    match with_board(|board| board.update_task(&task_id, patch)) {
        Ok(()) => BoardActionResponse::success("Task updated.", Some(task_id)),
        Err(message) => {
            BoardActionResponse::failure(format!("board_update_task failed: {message}"))
        }
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn board_toggle_task(task_id: String) -> BoardActionResponse {
    match with_board(|board| board.toggle_task(&task_id)) {
        Ok(true) => BoardActionResponse::success("Task completed.", Some(task_id)),
        Ok(false) => BoardActionResponse::success("Task reopened.", Some(task_id)),
        Err(message) => {
            BoardActionResponse::failure(format!("board_toggle_task failed: {message}"))
        }
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn board_delete_task(task_id: String) -> BoardActionResponse {
    match with_board(|board| board.delete_task(&task_id)) {
        Ok(()) => BoardActionResponse::success("Task deleted.", Some(task_id)),
        Err(message) => {
            BoardActionResponse::failure(format!("board_delete_task failed: {message}"))
        }
    }
}

/// Applies a drag-reorder; `task_ids` lists every task in the new order.
#[flutter_rust_bridge::frb(sync)]
pub fn board_reorder(task_ids: Vec<String>) -> BoardActionResponse {
    match with_board(|board| board.reorder(&task_ids)) {
        Ok(changed) => BoardActionResponse::success(format!("Reordered {changed} task(s)."), None),
        Err(message) => BoardActionResponse::failure(format!("board_reorder failed: {message}")),
    }
}

/// Sets the priority filter (`all|high|medium|low`).
#[flutter_rust_bridge::frb(sync)]
pub fn board_set_filter(filter: String) -> BoardActionResponse {
    let Some(filter) = PriorityFilter::parse(&filter) else {
        return BoardActionResponse::failure(format!("unknown filter `{filter}`"));
    };
    match with_board(|board| {
        board.set_filter(filter);
        Ok::<_, String>(())
    }) {
        Ok(()) => BoardActionResponse::success(format!("Filter set to {filter}."), None),
        Err(message) => BoardActionResponse::failure(format!("board_set_filter failed: {message}")),
    }
}

/// Sets the sort mode (`custom|dueDate`).
#[flutter_rust_bridge::frb(sync)]
pub fn board_set_sort(sort: String) -> BoardActionResponse {
    let Some(sort) = SortMode::parse(&sort) else {
        return BoardActionResponse::failure(format!("unknown sort `{sort}`"));
    };
    match with_board(|board| {
        board.set_sort(sort);
        Ok::<_, String>(())
    }) {
        Ok(()) => BoardActionResponse::success(format!("Sort set to {sort}."), None),
        Err(message) => BoardActionResponse::failure(format!("board_set_sort failed: {message}")),
    }
}

/// Asks the provider for a replacement task list and stages it.
///
/// # FFI contract
/// - Blocking network call; run off the UI isolate.
/// - A call made while another is outstanding fails immediately.
#[flutter_rust_bridge::frb(sync)]
pub fn board_request_suggestions() -> SuggestionResponse {
    let prepared = with_board(|board| {
        board
            .suggestion_request()
            .map(|request| (board.suggestion_flow(), request))
    });
    let (flow, request) = match prepared {
        Ok(prepared) => prepared,
        Err(message) => return suggestion_failure("board_request_suggestions", message),
    };
    match flow.request_suggestions(&request) {
        Ok(items) => SuggestionResponse {
            ok: true,
            message: format!("{} suggestion(s) staged.", items.len()),
            items,
        },
        Err(err) => suggestion_failure("board_request_suggestions", err.to_string()),
    }
}

/// Replaces every task with the staged suggestions in one atomic batch.
#[flutter_rust_bridge::frb(sync)]
pub fn board_accept_suggestions() -> SuggestionResponse {
    match with_board(|board| board.accept_suggestions()) {
        Ok(ids) => SuggestionResponse {
            ok: true,
            message: format!("Replaced tasks with {} suggestion(s).", ids.len()),
            items: ids,
        },
        Err(message) => suggestion_failure("board_accept_suggestions", message),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn board_reject_suggestions() -> SuggestionResponse {
    match with_board(|board| board.reject_suggestions()) {
        Ok(()) => SuggestionResponse {
            ok: true,
            items: Vec::new(),
            message: "Suggestions discarded.".to_string(),
        },
        Err(message) => suggestion_failure("board_reject_suggestions", message),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn goal_save(text: String) -> GoalResponse {
    match with_board(|board| board.save_goal(&text)) {
        Ok(goal) => GoalResponse {
            ok: true,
            text: Some(goal.text),
            message: "Goal saved.".to_string(),
        },
        Err(message) => GoalResponse {
            ok: false,
            text: None,
            message: format!("goal_save failed: {message}"),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn goal_load() -> GoalResponse {
    match with_board(|board| board.goal()) {
        Ok(goal) => GoalResponse {
            ok: true,
            message: if goal.is_some() {
                "Goal loaded.".to_string()
            } else {
                "No goal set.".to_string()
            },
            text: goal.map(|goal| goal.text),
        },
        Err(message) => GoalResponse {
            ok: false,
            text: None,
            message: format!("goal_load failed: {message}"),
        },
    }
}

fn lock_board() -> MutexGuard<'static, Option<GoalBoard>> {
    BOARD.lock().unwrap_or_else(|poisoned| {
        warn!("event=board_lock module=ffi status=recovered");
        poisoned.into_inner()
    })
}

fn with_board<T, E: std::fmt::Display>(
    f: impl FnOnce(&mut GoalBoard) -> Result<T, E>,
) -> Result<T, String> {
    let mut slot = lock_board();
    let board = slot
        .as_mut()
        .ok_or_else(|| "no board is open; call board_open first".to_string())?;
    f(board).map_err(|err| err.to_string())
}

fn suggestion_failure(operation: &str, message: String) -> SuggestionResponse {
    SuggestionResponse {
        ok: false,
        items: Vec::new(),
        message: format!("{operation} failed: {message}"),
    }
}

fn build_draft(
    text: String,
    priority: Option<String>,
    due_date: Option<String>,
    estimated_time_minutes: Option<i64>,
) -> Result<TaskDraft, String> {
    let mut draft = TaskDraft::new(text);
    if let Some(priority) = priority.filter(|value| !value.trim().is_empty()) {
        draft = draft.with_priority(Priority::parse(&priority).map_err(|err| err.to_string())?);
    }
    if let Some(due_date) = due_date {
        draft = draft.with_due_date(parse_due_date(&due_date).map_err(|err| err.to_string())?);
    }
    if let Some(minutes) = estimated_time_minutes {
        draft = draft.with_estimate(parse_estimate(minutes).map_err(|err| err.to_string())?);
    }
    Ok(draft)
}

fn build_patch(
    text: Option<String>,
    priority: Option<String>,
    due_date: Option<String>,
    estimated_time_minutes: Option<i64>,
) -> Result<TaskPatch, String> {
    Ok(TaskPatch {
        text,
        priority: priority
            .map(|value| Priority::parse(&value))
            .transpose()
            .map_err(|err| err.to_string())?,
        due_date: due_date
            .map(|value| parse_due_date(&value))
            .transpose()
            .map_err(|err| err.to_string())?,
        estimated_time_minutes: estimated_time_minutes
            .map(parse_estimate)
            .transpose()
            .map_err(|err| err.to_string())?,
    })
}

fn to_task_item(task: Task) -> TaskItem {
    TaskItem {
        priority: task.priority.as_str().to_string(),
        due_date: task.due_date.map(|date| date.format("%Y-%m-%d").to_string()),
        id: task.id,
        text: task.text,
        completed: task.completed,
        estimated_time_minutes: task.estimated_time_minutes,
        order: task.order,
    }
}

fn to_view_response(view: BoardView) -> BoardViewResponse {
    let (staged_suggestions, suggestion_error) = match &view.suggestions {
        SuggestionState::Staged(items) => (items.clone(), None),
        SuggestionState::Failed(message) => (Vec::new(), Some(message.clone())),
        _ => (Vec::new(), None),
    };
    BoardViewResponse {
        ok: true,
        message: format!("{} of {} task(s) shown.", view.tasks.len(), view.total),
        goal_id: view.goal_id,
        total: u32::try_from(view.total).unwrap_or(u32::MAX),
        tasks: view.tasks.into_iter().map(to_task_item).collect(),
        loading: view.loading,
        error: view.error,
        filter: view.options.filter.to_string(),
        sort: view.options.sort.to_string(),
        can_reorder: view.can_reorder,
        suggestion_state: view.suggestions.label().to_string(),
        staged_suggestions,
        suggestion_error,
    }
}
