//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist documents as JSON field maps keyed by `(collection_path, doc_id)`.
//! - Run batches inside one `IMMEDIATE` transaction.
//! - Push a fresh snapshot to every live subscriber of each touched
//!   collection after a commit.
//!
//! # Invariants
//! - Lock order is always connection, then watchers.
//! - Snapshots are published only after a successful commit.

use super::path::DocumentPath;
use super::{
    BatchOp, CollectionEvent, CollectionPath, Document, DocumentStore, Fields, SnapshotSender,
    StoreError, StoreResult, Subscription,
};
use crate::db::migrations::ensure_latest;
use crate::db::{open_db, open_db_in_memory};
use log::{debug, error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use uuid::Uuid;

static ORDER_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid order field regex"));

struct Watcher {
    collection: CollectionPath,
    order_field: String,
    sender: SnapshotSender,
}

/// Local real-time document backend.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    watchers: Mutex<Vec<Watcher>>,
}

impl SqliteDocumentStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_migrated(open_db(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_migrated(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_latest(&conn)?;
        Ok(Self::from_migrated(conn))
    }

    fn from_migrated(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Number of live subscriptions; cancelled ones are pruned first.
    pub fn watcher_count(&self) -> usize {
        let mut watchers = self.lock_watchers();
        watchers.retain(|watcher| watcher.sender.is_active());
        watchers.len()
    }

    fn lock_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn lock_watchers(&self) -> MutexGuard<'_, Vec<Watcher>> {
        self.watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, conn: &Connection, touched: &BTreeSet<CollectionPath>) {
        let mut watchers = self.lock_watchers();
        watchers.retain(|watcher| watcher.sender.is_active());
        for watcher in watchers.iter() {
            if !touched.contains(&watcher.collection) {
                continue;
            }
            let event = match load_collection(conn, &watcher.collection, &watcher.order_field) {
                Ok(documents) => CollectionEvent::Snapshot(documents),
                Err(err) => {
                    error!(
                        "event=snapshot_publish module=store status=error collection={} error={}",
                        watcher.collection, err
                    );
                    CollectionEvent::Error(err.to_string())
                }
            };
            watcher.sender.send(event);
        }
    }

    fn write_one(&self, op: BatchOp) -> StoreResult<()> {
        let started_at = Instant::now();
        let conn = self.lock_conn()?;
        if let Err(message) = apply_op(&conn, &op) {
            error!(
                "event=doc_write module=store status=error op={} collection={} duration_ms={} error={}",
                op.kind(),
                op.path().collection(),
                started_at.elapsed().as_millis(),
                message
            );
            return Err(StoreError::Write {
                path: op.path().to_string(),
                message,
            });
        }
        debug!(
            "event=doc_write module=store status=ok op={} collection={} duration_ms={}",
            op.kind(),
            op.path().collection(),
            started_at.elapsed().as_millis()
        );
        self.publish(&conn, &BTreeSet::from([op.path().collection().clone()]));
        Ok(())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn subscribe_collection(
        &self,
        path: &CollectionPath,
        order_field: &str,
    ) -> StoreResult<Subscription> {
        if !ORDER_FIELD_RE.is_match(order_field) {
            return Err(StoreError::InvalidPath(format!(
                "invalid order field `{order_field}`"
            )));
        }

        let conn = self.lock_conn()?;
        let initial = load_collection(&conn, path, order_field)?;
        let (sender, subscription) = Subscription::channel();
        let count = initial.len();
        sender.send(CollectionEvent::Snapshot(initial));
        self.lock_watchers().push(Watcher {
            collection: path.clone(),
            order_field: order_field.to_string(),
            sender,
        });

        debug!(
            "event=collection_subscribe module=store status=ok collection={} initial_count={}",
            path, count
        );
        Ok(subscription)
    }

    fn add_document(&self, path: &CollectionPath, fields: Fields) -> StoreResult<String> {
        let doc_id = self.new_document_id();
        self.write_one(BatchOp::Set(path.doc(&doc_id)?, fields))?;
        Ok(doc_id)
    }

    fn update_document(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        self.write_one(BatchOp::Update(path.clone(), fields))
    }

    fn delete_document(&self, path: &DocumentPath) -> StoreResult<()> {
        self.write_one(BatchOp::Delete(path.clone()))
    }

    fn atomic_batch(&self, ops: Vec<BatchOp>) -> StoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let started_at = Instant::now();
        let op_count = ops.len();
        let batch_error = |message: String| StoreError::Batch { op_count, message };

        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| batch_error(err.to_string()))?;
        for op in &ops {
            if let Err(message) = apply_op(&tx, op) {
                error!(
                    "event=doc_batch module=store status=error ops={} failed_op={} duration_ms={} error={}",
                    op_count,
                    op.kind(),
                    started_at.elapsed().as_millis(),
                    message
                );
                // Dropping `tx` rolls every earlier operation back.
                return Err(batch_error(format!("{} `{}`: {message}", op.kind(), op.path())));
            }
        }
        tx.commit().map_err(|err| batch_error(err.to_string()))?;

        info!(
            "event=doc_batch module=store status=ok ops={} duration_ms={}",
            op_count,
            started_at.elapsed().as_millis()
        );
        let touched: BTreeSet<CollectionPath> = ops
            .iter()
            .map(|op| op.path().collection().clone())
            .collect();
        self.publish(&conn, &touched);
        Ok(())
    }

    fn get_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let conn = self.lock_conn()?;
        load_document(&conn, path)
    }

    fn new_document_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

fn apply_op(conn: &Connection, op: &BatchOp) -> Result<(), String> {
    match op {
        BatchOp::Delete(path) => {
            conn.execute(
                "DELETE FROM documents WHERE collection_path = ?1 AND doc_id = ?2;",
                params![path.collection().as_str(), path.doc_id()],
            )
            .map_err(|err| err.to_string())?;
        }
        BatchOp::Set(path, fields) => {
            conn.execute(
                "INSERT INTO documents (collection_path, doc_id, fields)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (collection_path, doc_id) DO UPDATE
                 SET fields = excluded.fields,
                     updated_at = (strftime('%s', 'now') * 1000);",
                params![
                    path.collection().as_str(),
                    path.doc_id(),
                    encode_fields(fields)?
                ],
            )
            .map_err(|err| err.to_string())?;
        }
        BatchOp::Update(path, fields) => {
            let mut merged = load_document(conn, path)
                .map_err(|err| err.to_string())?
                .ok_or_else(|| "document not found".to_string())?
                .fields;
            for (key, value) in fields {
                merged.insert(key.clone(), value.clone());
            }
            conn.execute(
                "UPDATE documents
                 SET fields = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE collection_path = ?1 AND doc_id = ?2;",
                params![
                    path.collection().as_str(),
                    path.doc_id(),
                    encode_fields(&merged)?
                ],
            )
            .map_err(|err| err.to_string())?;
        }
    }
    Ok(())
}

fn load_collection(
    conn: &Connection,
    collection: &CollectionPath,
    order_field: &str,
) -> StoreResult<Vec<Document>> {
    let map_db = |err: rusqlite::Error| StoreError::Db(err.into());
    let mut stmt = conn
        .prepare(
            "SELECT doc_id, fields
             FROM documents
             WHERE collection_path = ?1
             ORDER BY json_extract(fields, ?2) ASC, doc_id ASC;",
        )
        .map_err(map_db)?;
    let mut rows = stmt
        .query(params![collection.as_str(), format!("$.{order_field}")])
        .map_err(map_db)?;

    let mut documents = Vec::new();
    while let Some(row) = rows.next().map_err(map_db)? {
        let id: String = row.get(0).map_err(map_db)?;
        let raw: String = row.get(1).map_err(map_db)?;
        let fields = decode_fields(&id, &raw)?;
        documents.push(Document { id, fields });
    }
    Ok(documents)
}

fn load_document(conn: &Connection, path: &DocumentPath) -> StoreResult<Option<Document>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT fields FROM documents WHERE collection_path = ?1 AND doc_id = ?2;",
            params![path.collection().as_str(), path.doc_id()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| StoreError::Db(err.into()))?;

    match raw {
        Some(raw) => Ok(Some(Document {
            id: path.doc_id().to_string(),
            fields: decode_fields(path.doc_id(), &raw)?,
        })),
        None => Ok(None),
    }
}

fn encode_fields(fields: &Fields) -> Result<String, String> {
    serde_json::to_string(fields).map_err(|err| err.to_string())
}

fn decode_fields(doc_id: &str, raw: &str) -> StoreResult<Fields> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(StoreError::InvalidData(format!(
            "document `{doc_id}` is not a JSON object"
        ))),
        Err(err) => Err(StoreError::InvalidData(format!(
            "document `{doc_id}` has malformed fields: {err}"
        ))),
    }
}
