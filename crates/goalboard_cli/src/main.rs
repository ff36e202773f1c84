//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `goalboard_core` linkage.
//! - When a board database is configured, print its custom-ordered tasks.

use goalboard_core::{compute_display_list, CoreConfig, PriorityFilter, SortMode, TaskStore};
use goalboard_core::{DocumentStore, SqliteDocumentStore};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("goalboard_core ping={}", goalboard_core::ping());
    println!("goalboard_core version={}", goalboard_core::core_version());

    let configured = std::env::var_os("GOALBOARD_DB_PATH").is_some()
        && std::env::var_os("GOALBOARD_OWNER_ID").is_some();
    if !configured {
        return ExitCode::SUCCESS;
    }
    match print_board() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("goalboard_cli error={message}");
            ExitCode::FAILURE
        }
    }
}

fn print_board() -> Result<(), String> {
    let config = CoreConfig::load(None).map_err(|err| err.to_string())?;
    config.start_logging().map_err(|err| err.to_string())?;
    let db_path = config
        .db_path
        .clone()
        .ok_or_else(|| "GOALBOARD_DB_PATH is not set".to_string())?;
    let store: Arc<dyn DocumentStore> =
        Arc::new(SqliteDocumentStore::open(&db_path).map_err(|err| err.to_string())?);

    let mut tasks = TaskStore::new(store, config.owner_id.clone());
    tasks
        .subscribe(&config.goal_id)
        .map_err(|err| err.to_string())?;
    if let Some(error) = tasks.last_error() {
        return Err(error.to_string());
    }

    println!(
        "board owner={} goal={} tasks={}",
        config.owner_id,
        config.goal_id,
        tasks.tasks().len()
    );
    for task in compute_display_list(tasks.tasks(), PriorityFilter::All, SortMode::Custom) {
        let due = task
            .due_date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4} [{}] {:<6} due={} est={}m {}",
            task.order,
            if task.completed { "x" } else { " " },
            task.priority,
            due,
            task.estimated_time_minutes,
            task.text
        );
    }
    tasks.unsubscribe();
    Ok(())
}
