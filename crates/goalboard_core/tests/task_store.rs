mod common;

use chrono::NaiveDate;
use common::{FaultyStore, GOAL, OWNER};
use goalboard_core::store::{CollectionPath, DocumentStore, Fields};
use goalboard_core::{
    parse_due_date, Priority, SqliteDocumentStore, TaskDraft, TaskPatch, TaskStore,
    TaskStoreError, TaskValidationError,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn subscribed(store: Arc<dyn DocumentStore>) -> TaskStore {
    let mut tasks = TaskStore::new(store, OWNER);
    tasks.subscribe(GOAL).unwrap();
    tasks
}

fn memory_store() -> Arc<dyn DocumentStore> {
    Arc::new(SqliteDocumentStore::open_in_memory().unwrap())
}

#[test]
fn add_task_round_trips_every_field() {
    let mut tasks = subscribed(memory_store());
    tasks.add_task(TaskDraft::new("Existing")).unwrap();
    tasks.sync();
    let previous_max = tasks.tasks().iter().map(|t| t.order).max().unwrap();

    let draft = TaskDraft::new("Write report")
        .with_priority(Priority::parse("high").unwrap())
        .with_due_date(parse_due_date("2025-03-01").unwrap())
        .with_estimate(30);
    let created = tasks.add_task(draft).unwrap();

    assert_eq!(created.text, "Write report");
    assert_eq!(created.priority, Priority::High);
    assert_eq!(created.due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
    assert_eq!(created.estimated_time_minutes, 30);
    assert!(!created.completed);
    assert_eq!(created.order, previous_max + 1);
    assert!(!created.is_provisional());

    tasks.sync();
    let stored = tasks.task(&created.id).unwrap();
    assert_eq!(stored, &created);
}

#[test]
fn new_tasks_always_land_above_the_current_maximum() {
    let store = memory_store();
    let collection = CollectionPath::tasks(OWNER, GOAL).unwrap();
    let mut fields = Fields::new();
    fields.insert("text".to_string(), json!("seeded"));
    fields.insert("order".to_string(), json!(41));
    fields.insert("createdAt".to_string(), json!(1));
    store.add_document(&collection, fields).unwrap();

    let mut tasks = subscribed(store);
    assert_eq!(tasks.tasks().len(), 1);

    let first = tasks.add_task(TaskDraft::new("one")).unwrap();
    let second = tasks.add_task(TaskDraft::new("two")).unwrap();
    assert_eq!(first.order, 42);
    assert_eq!(second.order, 43);

    tasks.sync();
    let orders: Vec<i64> = tasks.tasks().iter().map(|t| t.order).collect();
    assert_eq!(orders, vec![41, 42, 43]);
}

#[test]
fn first_task_of_an_empty_goal_gets_order_zero() {
    let mut tasks = subscribed(memory_store());
    assert!(!tasks.is_loading());
    assert_eq!(tasks.add_task(TaskDraft::new("first")).unwrap().order, 0);
}

#[test]
fn blank_text_is_rejected_before_any_write() {
    let store = FaultyStore::new();
    store.fail_add.store(true, Ordering::SeqCst);
    let mut tasks = subscribed(store);

    let err = tasks.add_task(TaskDraft::new("   ")).unwrap_err();
    assert!(matches!(
        err,
        TaskStoreError::Validation(TaskValidationError::EmptyText)
    ));
    assert!(tasks.tasks().is_empty());
    assert_eq!(tasks.last_error(), None);
}

#[test]
fn failed_add_removes_the_optimistic_task() {
    let store = FaultyStore::new();
    let mut tasks = subscribed(store.clone());
    tasks.add_task(TaskDraft::new("kept")).unwrap();
    tasks.sync();

    store.fail_add.store(true, Ordering::SeqCst);
    let err = tasks.add_task(TaskDraft::new("lost")).unwrap_err();
    assert!(matches!(err, TaskStoreError::Store(_)));

    let texts: Vec<&str> = tasks.tasks().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["kept"]);
    assert!(tasks.tasks().iter().all(|t| !t.is_provisional()));
    assert!(tasks.last_error().is_some());
}

#[test]
fn failed_toggle_keeps_the_local_flip_until_the_next_snapshot() {
    let store = FaultyStore::new();
    let mut tasks = subscribed(store.clone());
    let id = tasks.add_task(TaskDraft::new("flip me")).unwrap().id;
    tasks.sync();

    store.fail_update.store(true, Ordering::SeqCst);
    assert!(tasks.toggle_completion(&id).is_err());
    assert!(tasks.task(&id).unwrap().completed);

    // Any later snapshot carries the stored value and wins.
    store.fail_update.store(false, Ordering::SeqCst);
    store.fail_add.store(false, Ordering::SeqCst);
    tasks.add_task(TaskDraft::new("unrelated")).unwrap();
    tasks.sync();
    assert!(!tasks.task(&id).unwrap().completed);
    assert_eq!(tasks.last_error(), None);
}

#[test]
fn toggle_and_update_leave_order_alone() {
    let mut tasks = subscribed(memory_store());
    let id = tasks.add_task(TaskDraft::new("edit me")).unwrap().id;
    tasks.sync();
    let order = tasks.task(&id).unwrap().order;

    assert!(tasks.toggle_completion(&id).unwrap());
    tasks
        .update_task(
            &id,
            TaskPatch {
                text: Some("  edited ".to_string()),
                priority: Some(Priority::Low),
                due_date: Some(NaiveDate::from_ymd_opt(2025, 6, 30)),
                estimated_time_minutes: Some(15),
            },
        )
        .unwrap();
    tasks.sync();

    let task = tasks.task(&id).unwrap();
    assert!(task.completed);
    assert_eq!(task.text, "edited");
    assert_eq!(task.priority, Priority::Low);
    assert_eq!(task.estimated_time_minutes, 15);
    assert_eq!(task.order, order);

    tasks
        .update_task(
            &id,
            TaskPatch {
                due_date: Some(None),
                ..TaskPatch::default()
            },
        )
        .unwrap();
    tasks.sync();
    assert_eq!(tasks.task(&id).unwrap().due_date, None);
}

#[test]
fn delete_is_applied_by_the_next_snapshot() {
    let mut tasks = subscribed(memory_store());
    let id = tasks.add_task(TaskDraft::new("delete me")).unwrap().id;
    tasks.sync();

    tasks.delete_task(&id).unwrap();
    assert!(tasks.task(&id).is_some());
    tasks.sync();
    assert!(tasks.task(&id).is_none());
}

#[test]
fn failed_delete_changes_nothing_locally() {
    let store = FaultyStore::new();
    let mut tasks = subscribed(store.clone());
    let id = tasks.add_task(TaskDraft::new("sticky")).unwrap().id;
    tasks.sync();

    store.fail_delete.store(true, Ordering::SeqCst);
    assert!(tasks.delete_task(&id).is_err());
    tasks.sync();
    assert!(tasks.task(&id).is_some());
}

#[test]
fn commands_need_a_subscription_and_known_ids() {
    let mut tasks = TaskStore::new(memory_store(), OWNER);
    assert!(matches!(
        tasks.add_task(TaskDraft::new("x")),
        Err(TaskStoreError::NotSubscribed)
    ));

    tasks.subscribe(GOAL).unwrap();
    assert!(matches!(
        tasks.toggle_completion("missing"),
        Err(TaskStoreError::TaskNotFound(_))
    ));
    assert!(matches!(
        tasks.delete_task("missing"),
        Err(TaskStoreError::TaskNotFound(_))
    ));
}

#[test]
fn invalid_stored_document_keeps_the_previous_snapshot() {
    let store = memory_store();
    let mut tasks = subscribed(store.clone());
    tasks.add_task(TaskDraft::new("good")).unwrap();
    tasks.sync();

    let collection = CollectionPath::tasks(OWNER, GOAL).unwrap();
    let mut broken = Fields::new();
    broken.insert("text".to_string(), json!("no order"));
    broken.insert("createdAt".to_string(), json!(1));
    store.add_document(&collection, broken).unwrap();
    tasks.sync();

    assert_eq!(tasks.tasks().len(), 1);
    assert!(tasks.last_error().unwrap().contains("cannot be decoded"));
}

#[test]
fn snapshots_from_other_writers_are_reconciled() {
    let store = memory_store();
    let mut tasks = subscribed(store.clone());
    let mut other = TaskStore::new(store, OWNER);
    other.subscribe(GOAL).unwrap();

    other.add_task(TaskDraft::new("from elsewhere")).unwrap();
    assert_eq!(tasks.sync(), 1);
    assert_eq!(tasks.tasks()[0].text, "from elsewhere");
}

#[test]
fn unsubscribe_is_idempotent_and_stops_delivery() {
    let sqlite = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    let store: Arc<dyn DocumentStore> = sqlite.clone();
    let mut tasks = subscribed(store.clone());
    assert_eq!(sqlite.watcher_count(), 1);

    tasks.unsubscribe();
    tasks.unsubscribe();
    assert!(!tasks.is_subscribed());
    assert!(tasks.tasks().is_empty());
    assert_eq!(sqlite.watcher_count(), 0);

    let mut writer = TaskStore::new(store, OWNER);
    writer.subscribe(GOAL).unwrap();
    writer.add_task(TaskDraft::new("after close")).unwrap();
    assert_eq!(tasks.sync(), 0);
    assert!(tasks.tasks().is_empty());
}

#[test]
fn tasks_of_other_goals_are_not_delivered() {
    let store = memory_store();
    let mut main = subscribed(store.clone());
    let mut side = TaskStore::new(store, OWNER);
    side.subscribe("side").unwrap();

    side.add_task(TaskDraft::new("side task")).unwrap();
    assert_eq!(main.sync(), 0);
    assert!(main.tasks().is_empty());
}
