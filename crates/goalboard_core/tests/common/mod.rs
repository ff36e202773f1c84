#![allow(dead_code)]

use goalboard_core::store::{
    BatchOp, CollectionPath, Document, DocumentPath, DocumentStore, Fields, StoreError,
    StoreResult, Subscription,
};
use goalboard_core::suggest::{SuggestionRequest, SuggestionResult, SuggestionService};
use goalboard_core::SqliteDocumentStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

pub const OWNER: &str = "owner-1";
pub const GOAL: &str = "main";

/// SQLite store with switchable write failures.
pub struct FaultyStore {
    pub inner: SqliteDocumentStore,
    pub fail_add: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Injects an update of a missing document into the middle of the next
    /// batches, so the real transaction fails after earlier ops ran.
    pub fail_batch_midway: AtomicBool,
    pub batches: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteDocumentStore::open_in_memory().unwrap(),
            fail_add: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_batch_midway: AtomicBool::new(false),
            batches: AtomicUsize::new(0),
        })
    }
}

fn injected(path: String) -> StoreError {
    StoreError::Write {
        path,
        message: "injected failure".to_string(),
    }
}

impl DocumentStore for FaultyStore {
    fn subscribe_collection(
        &self,
        path: &CollectionPath,
        order_field: &str,
    ) -> StoreResult<Subscription> {
        self.inner.subscribe_collection(path, order_field)
    }

    fn add_document(&self, path: &CollectionPath, fields: Fields) -> StoreResult<String> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(injected(path.to_string()));
        }
        self.inner.add_document(path, fields)
    }

    fn update_document(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(injected(path.to_string()));
        }
        self.inner.update_document(path, fields)
    }

    fn delete_document(&self, path: &DocumentPath) -> StoreResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected(path.to_string()));
        }
        self.inner.delete_document(path)
    }

    fn atomic_batch(&self, mut ops: Vec<BatchOp>) -> StoreResult<()> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self.fail_batch_midway.load(Ordering::SeqCst) {
            if let Some(first) = ops.first() {
                let poison = first.path().collection().doc("does-not-exist").unwrap();
                let middle = ops.len() / 2;
                ops.insert(middle, BatchOp::Update(poison, Fields::new()));
            }
        }
        self.inner.atomic_batch(ops)
    }

    fn get_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        self.inner.get_document(path)
    }

    fn new_document_id(&self) -> String {
        self.inner.new_document_id()
    }
}

/// Returns a fixed reply and counts calls.
pub struct StaticService {
    pub reply: SuggestionResult<Vec<String>>,
    pub calls: AtomicUsize,
}

impl StaticService {
    pub fn ok(texts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(texts.iter().map(|text| text.to_string()).collect()),
            calls: AtomicUsize::new(0),
        })
    }
}

impl SuggestionService for StaticService {
    fn name(&self) -> &str {
        "static"
    }

    fn suggest(&self, _request: &SuggestionRequest) -> SuggestionResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

/// Blocks inside `suggest` until released, to hold a request in flight.
pub struct GatedService {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
    pub calls: AtomicUsize,
    reply: Vec<String>,
}

pub struct Gate {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
}

impl GatedService {
    pub fn new(texts: &[&str]) -> (Arc<Self>, Gate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let service = Arc::new(Self {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
            calls: AtomicUsize::new(0),
            reply: texts.iter().map(|text| text.to_string()).collect(),
        });
        (
            service,
            Gate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }
}

impl SuggestionService for GatedService {
    fn name(&self) -> &str {
        "gated"
    }

    fn suggest(&self, _request: &SuggestionRequest) -> SuggestionResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Ok(self.reply.clone())
    }
}
