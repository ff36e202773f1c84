mod common;

use common::{FaultyStore, GOAL, OWNER};
use goalboard_core::service::ordering::reorder;
use goalboard_core::store::DocumentStore;
use goalboard_core::{
    Priority, PriorityFilter, ReorderBlocked, SortMode, SqliteDocumentStore, TaskDraft, TaskId,
    TaskStore, TaskStoreError, ViewOptions,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn seeded(store: Arc<dyn DocumentStore>, texts: &[&str]) -> (TaskStore, Vec<TaskId>) {
    let mut tasks = TaskStore::new(store, OWNER);
    tasks.subscribe(GOAL).unwrap();
    let ids = texts
        .iter()
        .map(|text| tasks.add_task(TaskDraft::new(*text)).unwrap().id)
        .collect();
    tasks.sync();
    (tasks, ids)
}

fn texts(tasks: &TaskStore) -> Vec<String> {
    tasks.tasks().iter().map(|t| t.text.clone()).collect()
}

fn orders(tasks: &TaskStore) -> Vec<i64> {
    tasks.tasks().iter().map(|t| t.order).collect()
}

#[test]
fn reorder_persists_zero_based_sequence() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    let (mut tasks, ids) = seeded(store.clone(), &["a", "b", "c"]);

    let sequence = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];
    reorder(&mut tasks, &ViewOptions::default(), &sequence).unwrap();
    assert_eq!(texts(&tasks), vec!["c", "a", "b"]);

    tasks.sync();
    assert_eq!(texts(&tasks), vec!["c", "a", "b"]);
    assert_eq!(orders(&tasks), vec![0, 1, 2]);

    let mut fresh = TaskStore::new(store, OWNER);
    fresh.subscribe(GOAL).unwrap();
    assert_eq!(texts(&fresh), vec!["c", "a", "b"]);
    assert_eq!(orders(&fresh), vec![0, 1, 2]);
}

#[test]
fn reorder_only_writes_changed_tasks_in_one_batch() {
    let store = FaultyStore::new();
    let (mut tasks, ids) = seeded(store.clone(), &["a", "b", "c"]);
    let before = store.batches.load(Ordering::SeqCst);

    let changed = reorder(
        &mut tasks,
        &ViewOptions::default(),
        &[ids[1].clone(), ids[0].clone(), ids[2].clone()],
    )
    .unwrap();
    assert_eq!(changed, 2);
    assert_eq!(store.batches.load(Ordering::SeqCst), before + 1);

    let unchanged = reorder(&mut tasks, &ViewOptions::default(), &[
        ids[1].clone(),
        ids[0].clone(),
        ids[2].clone(),
    ])
    .unwrap();
    assert_eq!(unchanged, 0);
    assert_eq!(store.batches.load(Ordering::SeqCst), before + 1);
}

#[test]
fn reorder_is_refused_under_filter_or_due_date_sort() {
    let store = FaultyStore::new();
    let (mut tasks, ids) = seeded(store.clone(), &["a", "b"]);
    let swapped = vec![ids[1].clone(), ids[0].clone()];
    let batches = store.batches.load(Ordering::SeqCst);

    let filtered = ViewOptions {
        filter: PriorityFilter::Only(Priority::High),
        sort: SortMode::Custom,
    };
    assert!(matches!(
        reorder(&mut tasks, &filtered, &swapped),
        Err(TaskStoreError::Precondition(ReorderBlocked::FilterActive))
    ));

    let by_date = ViewOptions {
        filter: PriorityFilter::All,
        sort: SortMode::DueDate,
    };
    assert!(matches!(
        reorder(&mut tasks, &by_date, &swapped),
        Err(TaskStoreError::Precondition(ReorderBlocked::SortedByDueDate))
    ));

    assert_eq!(store.batches.load(Ordering::SeqCst), batches);
    tasks.sync();
    assert_eq!(texts(&tasks), vec!["a", "b"]);
    assert_eq!(orders(&tasks), vec![0, 1]);
}

#[test]
fn failed_batch_restores_the_previous_snapshot() {
    let store = FaultyStore::new();
    let (mut tasks, ids) = seeded(store.clone(), &["a", "b", "c"]);
    let before = tasks.tasks().to_vec();

    store.fail_batch_midway.store(true, Ordering::SeqCst);
    let err = reorder(
        &mut tasks,
        &ViewOptions::default(),
        &[ids[2].clone(), ids[1].clone(), ids[0].clone()],
    )
    .unwrap_err();
    assert!(matches!(err, TaskStoreError::Store(_)));
    assert_eq!(tasks.tasks(), before.as_slice());
    assert!(tasks.last_error().is_some());

    store.fail_batch_midway.store(false, Ordering::SeqCst);
    let mut fresh = TaskStore::new(store, OWNER);
    fresh.subscribe(GOAL).unwrap();
    assert_eq!(texts(&fresh), vec!["a", "b", "c"]);
}

#[test]
fn partial_sequences_are_rejected() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    let (mut tasks, ids) = seeded(store, &["a", "b"]);
    assert!(matches!(
        reorder(&mut tasks, &ViewOptions::default(), &[ids[1].clone()]),
        Err(TaskStoreError::SequenceMismatch {
            expected: 2,
            actual: 1
        })
    ));
    assert_eq!(texts(&tasks), vec!["a", "b"]);
}
