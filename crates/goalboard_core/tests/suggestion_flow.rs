mod common;

use common::{FaultyStore, GatedService, StaticService, GOAL, OWNER};
use goalboard_core::suggest::SuggestionResult;
use goalboard_core::{
    BoardError, GoalBoard, Priority, SuggestionError, SuggestionFlowError, SuggestionRequest,
    SuggestionService, SuggestionState, Task, TaskDraft,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn board_with(store: Arc<FaultyStore>, service: Arc<dyn SuggestionService>) -> GoalBoard {
    let mut board = GoalBoard::open(store, service, OWNER, GOAL).unwrap();
    board.save_goal("Ship the side project").unwrap();
    board
}

fn snapshot(board: &mut GoalBoard) -> Vec<(String, i64, bool)> {
    board
        .view()
        .tasks
        .iter()
        .map(|t| (t.text.clone(), t.order, t.completed))
        .collect()
}

#[test]
fn accept_replaces_every_task_with_default_fields() {
    let store = FaultyStore::new();
    let service = StaticService::ok(&["Plan", "Build", "Launch"]);
    let mut board = board_with(store, service);
    board
        .add_task(TaskDraft::new("old one").with_priority(Priority::High))
        .unwrap();
    let done = board.add_task(TaskDraft::new("old two")).unwrap();
    board.toggle_task(&done.id).unwrap();
    let prior_max = board.view().tasks.iter().map(|t| t.order).max().unwrap();

    board.request_suggestions().unwrap();
    let ids = board.accept_suggestions().unwrap();
    assert_eq!(ids.len(), 3);

    let view = board.view();
    assert_eq!(view.suggestions, SuggestionState::Idle);
    let tasks: &[Task] = &view.tasks;
    let texts: Vec<&str> = tasks.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["Plan", "Build", "Launch"]);
    let orders: Vec<i64> = tasks.iter().map(|t| t.order).collect();
    assert_eq!(orders, vec![prior_max + 1, prior_max + 2, prior_max + 3]);
    for task in tasks {
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert_eq!(task.due_date, None);
        assert_eq!(task.estimated_time_minutes, 0);
    }
}

#[test]
fn accepting_on_an_empty_goal_starts_at_zero() {
    let mut board = board_with(FaultyStore::new(), StaticService::ok(&["a", "b"]));
    board.request_suggestions().unwrap();
    board.accept_suggestions().unwrap();
    let orders: Vec<i64> = board.view().tasks.iter().map(|t| t.order).collect();
    assert_eq!(orders, vec![0, 1]);
}

#[test]
fn failure_mid_batch_leaves_prior_tasks_intact() {
    let store = FaultyStore::new();
    let mut board = board_with(store.clone(), StaticService::ok(&["x", "y", "z"]));
    board.add_task(TaskDraft::new("keep a")).unwrap();
    board.add_task(TaskDraft::new("keep b")).unwrap();
    let before = snapshot(&mut board);

    board.request_suggestions().unwrap();
    store.fail_batch_midway.store(true, Ordering::SeqCst);
    let err = board.accept_suggestions().unwrap_err();
    assert!(matches!(
        err,
        BoardError::Suggestions(SuggestionFlowError::Commit(_))
    ));

    assert_eq!(snapshot(&mut board), before);
    let view = board.view();
    assert!(matches!(view.suggestions, SuggestionState::Failed(_)));
    assert!(view.error.is_some());

    // Staged suggestions were discarded.
    assert!(matches!(
        board.accept_suggestions(),
        Err(BoardError::Suggestions(SuggestionFlowError::InvalidTransition { .. }))
    ));
}

#[test]
fn empty_or_blank_replies_fail_without_touching_tasks() {
    for reply in [&[][..], &["  ", ""][..]] {
        let store = FaultyStore::new();
        let mut board = board_with(store.clone(), StaticService::ok(reply));
        board.add_task(TaskDraft::new("keep a")).unwrap();
        board.add_task(TaskDraft::new("keep b")).unwrap();
        let before = snapshot(&mut board);
        let batches = store.batches.load(Ordering::SeqCst);

        assert!(matches!(
            board.request_suggestions(),
            Err(BoardError::Suggestions(SuggestionFlowError::Service(
                SuggestionError::Empty
            )))
        ));
        assert!(matches!(board.view().suggestions, SuggestionState::Failed(_)));
        assert!(matches!(
            board.accept_suggestions(),
            Err(BoardError::Suggestions(SuggestionFlowError::InvalidTransition { .. }))
        ));

        assert_eq!(snapshot(&mut board), before);
        assert_eq!(store.batches.load(Ordering::SeqCst), batches);
    }
}

#[test]
fn staged_suggestions_are_trimmed_and_blanks_dropped() {
    let mut board = board_with(
        FaultyStore::new(),
        StaticService::ok(&["  Plan ", " ", "Launch"]),
    );
    let staged = board.request_suggestions().unwrap();
    assert_eq!(staged, vec!["Plan".to_string(), "Launch".to_string()]);
    assert_eq!(board.view().suggestions, SuggestionState::Staged(staged));
}

#[test]
fn reject_leaves_tasks_and_orders_unchanged() {
    let store = FaultyStore::new();
    let service = StaticService::ok(&["new"]);
    let mut board = board_with(store.clone(), service);
    board.add_task(TaskDraft::new("first")).unwrap();
    board.add_task(TaskDraft::new("second")).unwrap();
    let before = snapshot(&mut board);
    let batches = store.batches.load(Ordering::SeqCst);

    board.request_suggestions().unwrap();
    board.reject_suggestions().unwrap();

    assert_eq!(board.view().suggestions, SuggestionState::Idle);
    assert_eq!(snapshot(&mut board), before);
    assert_eq!(store.batches.load(Ordering::SeqCst), batches);
}

#[test]
fn second_request_while_first_is_outstanding_is_rejected() {
    let (service, gate) = GatedService::new(&["one", "two"]);
    let mut board = board_with(FaultyStore::new(), service.clone());
    let flow = board.suggestion_flow();
    let request = board.suggestion_request().unwrap();

    let worker = {
        let flow = flow.clone();
        let request = request.clone();
        thread::spawn(move || flow.request_suggestions(&request))
    };
    gate.entered.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(flow.state(), SuggestionState::Requesting);

    let err = flow.request_suggestions(&request).unwrap_err();
    assert!(matches!(err, SuggestionFlowError::AlreadyInFlight));
    assert!(matches!(
        board.request_suggestions(),
        Err(BoardError::Suggestions(SuggestionFlowError::AlreadyInFlight))
    ));
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);

    gate.release.send(()).unwrap();
    let staged = worker.join().unwrap().unwrap();
    assert_eq!(staged, vec!["one".to_string(), "two".to_string()]);
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    assert_eq!(board.view().suggestions, SuggestionState::Staged(staged));
}

struct FailsOnce {
    calls: AtomicUsize,
}

impl SuggestionService for FailsOnce {
    fn name(&self) -> &str {
        "fails_once"
    }

    fn suggest(&self, _request: &SuggestionRequest) -> SuggestionResult<Vec<String>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(SuggestionError::Provider {
                status: Some(500),
                message: "model overloaded".to_string(),
            });
        }
        Ok(vec!["retry worked".to_string()])
    }
}

#[test]
fn provider_failure_moves_to_failed_and_allows_retry() {
    let service = Arc::new(FailsOnce {
        calls: AtomicUsize::new(0),
    });
    let mut board = board_with(FaultyStore::new(), service);

    let err = board.request_suggestions().unwrap_err();
    assert!(err.to_string().contains("model overloaded"));
    assert_eq!(
        board.view().suggestions,
        SuggestionState::Failed("suggestion provider returned 500: model overloaded".to_string())
    );

    board.request_suggestions().unwrap();
    assert_eq!(
        board.view().suggestions,
        SuggestionState::Staged(vec!["retry worked".to_string()])
    );
}

#[test]
fn request_without_a_goal_sends_nothing() {
    let service = StaticService::ok(&["never"]);
    let mut board =
        GoalBoard::open(FaultyStore::new(), service.clone(), OWNER, GOAL).unwrap();
    assert!(matches!(
        board.request_suggestions(),
        Err(BoardError::Suggestions(SuggestionFlowError::EmptyGoal))
    ));
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    assert_eq!(board.view().suggestions, SuggestionState::Idle);
}

#[test]
fn request_carries_only_the_sanitized_projection() {
    let mut board = board_with(FaultyStore::new(), StaticService::ok(&["x"]));
    board
        .add_task(TaskDraft::new("Draft outline").with_estimate(90))
        .unwrap();
    let request = board.suggestion_request().unwrap();
    assert_eq!(request.goal_text, "Ship the side project");
    let body = serde_json::to_value(&request).unwrap();
    let task = body["tasks"][0].as_object().unwrap();
    let mut keys: Vec<&str> = task.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["completed", "dueDate", "priority", "text"]);
}
