//! Task persistence over the document store.
//!
//! # Responsibility
//! - Map `Task` records to and from document field maps.
//! - Offer the task-shaped remote writes the task store and ordering engine
//!   need (create, patch, delete, order batch, full replacement).
//!
//! # Invariants
//! - Write paths validate before touching the store.
//! - Read paths reject invalid stored tasks instead of masking them.
//! - `id` is never stored inside the field map; the document id is the task id.

use crate::model::task::{Priority, Task, TaskId, TaskPatch};
use crate::store::{
    BatchOp, CollectionPath, Document, DocumentStore, Fields, StoreError, StoreResult,
    Subscription,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Field used to sort the live task collection.
pub const ORDER_FIELD: &str = "order";

/// Stored shape of a task document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskFields {
    text: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    estimated_time_minutes: u32,
    order: i64,
    created_at: i64,
}

/// Task-shaped access to one goal's task collection.
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn DocumentStore>,
    collection: CollectionPath,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn DocumentStore>, collection: CollectionPath) -> Self {
        Self { store, collection }
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Opens the live `order`-sorted subscription.
    pub fn subscribe(&self) -> StoreResult<Subscription> {
        self.store
            .subscribe_collection(&self.collection, ORDER_FIELD)
    }

    /// Persists a new task and returns the store-assigned id.
    ///
    /// `task.id` is ignored; the store assigns the permanent one.
    pub fn create(&self, task: &Task) -> StoreResult<TaskId> {
        validate(task)?;
        self.store
            .add_document(&self.collection, task_to_fields(task)?)
    }

    pub fn set_completed(&self, id: &str, completed: bool) -> StoreResult<()> {
        self.update(id, json!({ "completed": completed }))
    }

    /// Writes only the fields present in `patch`.
    pub fn apply_patch(&self, id: &str, patch: &TaskPatch) -> StoreResult<()> {
        self.store
            .update_document(&self.collection.doc(id)?, patch_to_fields(patch))
    }

    pub fn delete(&self, id: &str) -> StoreResult<()> {
        self.store.delete_document(&self.collection.doc(id)?)
    }

    /// Writes every `(id, order)` pair in one atomic batch.
    pub fn write_orders(&self, orders: &[(TaskId, i64)]) -> StoreResult<()> {
        let ops = orders
            .iter()
            .map(|(id, order)| {
                Ok(BatchOp::Update(
                    self.collection.doc(id)?,
                    order_fields(*order),
                ))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        self.store.atomic_batch(ops)
    }

    /// Deletes `remove` and inserts `insert` in one atomic batch.
    ///
    /// Inserted tasks keep the ids they carry; reserve them with
    /// [`TaskRepository::reserve_id`].
    pub fn replace_all(&self, remove: &[TaskId], insert: &[Task]) -> StoreResult<()> {
        let mut ops = Vec::with_capacity(remove.len() + insert.len());
        for id in remove {
            ops.push(BatchOp::Delete(self.collection.doc(id)?));
        }
        for task in insert {
            validate(task)?;
            ops.push(BatchOp::Set(
                self.collection.doc(&task.id)?,
                task_to_fields(task)?,
            ));
        }
        self.store.atomic_batch(ops)
    }

    /// Reserves a permanent id for a batch insert.
    pub fn reserve_id(&self) -> TaskId {
        self.store.new_document_id()
    }

    fn update(&self, id: &str, value: Value) -> StoreResult<()> {
        let fields = match value {
            Value::Object(fields) => fields,
            _ => Fields::new(),
        };
        self.store
            .update_document(&self.collection.doc(id)?, fields)
    }
}

/// Decodes one full snapshot; any invalid document rejects the snapshot.
pub fn decode_snapshot(documents: &[Document]) -> StoreResult<Vec<Task>> {
    documents.iter().map(task_from_document).collect()
}

pub fn task_from_document(document: &Document) -> StoreResult<Task> {
    let fields: TaskFields = serde_json::from_value(Value::Object(document.fields.clone()))
        .map_err(|err| {
            StoreError::InvalidData(format!("task `{}` cannot be decoded: {err}", document.id))
        })?;
    let task = Task {
        id: document.id.clone(),
        text: fields.text,
        completed: fields.completed,
        priority: fields.priority,
        due_date: fields.due_date,
        estimated_time_minutes: fields.estimated_time_minutes,
        order: fields.order,
        created_at: fields.created_at,
    };
    validate(&task)?;
    Ok(task)
}

pub fn task_to_fields(task: &Task) -> StoreResult<Fields> {
    let stored = TaskFields {
        text: task.text.clone(),
        completed: task.completed,
        priority: task.priority,
        due_date: task.due_date,
        estimated_time_minutes: task.estimated_time_minutes,
        order: task.order,
        created_at: task.created_at,
    };
    match serde_json::to_value(stored) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(StoreError::InvalidData(
            "task fields did not serialize to an object".to_string(),
        )),
        Err(err) => Err(StoreError::InvalidData(err.to_string())),
    }
}

fn patch_to_fields(patch: &TaskPatch) -> Fields {
    let mut fields = Fields::new();
    if let Some(text) = &patch.text {
        fields.insert("text".to_string(), json!(text));
    }
    if let Some(priority) = patch.priority {
        fields.insert("priority".to_string(), json!(priority));
    }
    if let Some(due_date) = patch.due_date {
        fields.insert("dueDate".to_string(), json!(due_date));
    }
    if let Some(minutes) = patch.estimated_time_minutes {
        fields.insert("estimatedTimeMinutes".to_string(), json!(minutes));
    }
    fields
}

fn order_fields(order: i64) -> Fields {
    let mut fields = Fields::new();
    fields.insert(ORDER_FIELD.to_string(), json!(order));
    fields
}

fn validate(task: &Task) -> StoreResult<()> {
    task.validate()
        .map_err(|err| StoreError::InvalidData(format!("task `{}`: {err}", task.id)))
}
