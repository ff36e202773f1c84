//! Core domain logic for GoalBoard.
//! This crate owns the task-list synchronization and reconciliation engine.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod suggest;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::goal::{Goal, GoalId, OwnerId, DEFAULT_GOAL_ID};
pub use model::task::{
    parse_due_date, parse_estimate, Priority, Task, TaskDraft, TaskId, TaskPatch,
    TaskValidationError,
};
pub use service::board::{BoardError, BoardResult, BoardView, GoalBoard};
pub use service::goal_service::{GoalService, GoalServiceError};
pub use service::ordering::{compute_display_list, PriorityFilter, SortMode, ViewOptions};
pub use service::suggestion_flow::{SuggestionFlow, SuggestionFlowError, SuggestionState};
pub use service::task_store::{ReorderBlocked, TaskStore, TaskStoreError, TaskStoreResult};
pub use store::{DocumentStore, SqliteDocumentStore, StoreError, StoreResult};
pub use suggest::{
    HttpPlanService, OpenAiPlanService, SuggestionError, SuggestionRequest, SuggestionService,
};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
