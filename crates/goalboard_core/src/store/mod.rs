//! Remote document store adapter.
//!
//! # Responsibility
//! - Define the real-time document backend contract the task store consumes:
//!   subscribe, add, update, delete and all-or-nothing batches.
//! - Ship a SQLite-backed implementation with snapshot fan-out.
//!
//! # Invariants
//! - A failed `atomic_batch` leaves no partial effect observable to any read.
//! - Subscribers receive a full, `order_field`-sorted snapshot after every
//!   committed change to their collection.

use crate::db::DbError;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod path;
pub mod sqlite_store;
pub mod subscription;

pub use path::{CollectionPath, DocumentPath};
pub use sqlite_store::SqliteDocumentStore;
pub use subscription::{SnapshotSender, Subscription};

/// Field map of one stored document.
pub type Fields = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// One stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// One operation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Removes the document; missing documents are ignored.
    Delete(DocumentPath),
    /// Creates or fully replaces the document.
    Set(DocumentPath, Fields),
    /// Merges fields into an existing document; fails when it is missing.
    Update(DocumentPath, Fields),
}

impl BatchOp {
    pub fn path(&self) -> &DocumentPath {
        match self {
            Self::Delete(path) | Self::Set(path, _) | Self::Update(path, _) => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delete(_) => "delete",
            Self::Set(..) => "set",
            Self::Update(..) => "update",
        }
    }
}

/// Event pushed to a collection subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionEvent {
    /// Full collection contents sorted by the subscription's order field.
    Snapshot(Vec<Document>),
    /// The backend could not produce a snapshot.
    Error(String),
}

/// Document store failures.
#[derive(Debug)]
pub enum StoreError {
    /// Single-document write failed.
    Write { path: String, message: String },
    /// Atomic batch failed and was rolled back.
    Batch { op_count: usize, message: String },
    /// Malformed collection/document path or order field.
    InvalidPath(String),
    /// Stored document cannot be decoded.
    InvalidData(String),
    /// Backend is unusable (bootstrap failure, poisoned lock).
    Unavailable(String),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write { path, message } => write!(f, "write to `{path}` failed: {message}"),
            Self::Batch { op_count, message } => {
                write!(f, "batch of {op_count} operation(s) failed: {message}")
            }
            Self::InvalidPath(message) => write!(f, "{message}"),
            Self::InvalidData(message) => write!(f, "invalid stored document: {message}"),
            Self::Unavailable(message) => write!(f, "document store unavailable: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Real-time document backend.
///
/// Implementations must be shareable across threads; writes block until the
/// backend acknowledges them.
pub trait DocumentStore: Send + Sync {
    /// Opens a standing subscription. The current snapshot is delivered first.
    fn subscribe_collection(
        &self,
        path: &CollectionPath,
        order_field: &str,
    ) -> StoreResult<Subscription>;
    /// Adds a document and returns the store-assigned id.
    fn add_document(&self, path: &CollectionPath, fields: Fields) -> StoreResult<String>;
    /// Merges `fields` into an existing document.
    fn update_document(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()>;
    /// Deletes one document.
    fn delete_document(&self, path: &DocumentPath) -> StoreResult<()>;
    /// Applies every operation or none of them.
    fn atomic_batch(&self, ops: Vec<BatchOp>) -> StoreResult<()>;
    /// Reads one document.
    fn get_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>>;
    /// Reserves a fresh id for a `BatchOp::Set` insert.
    fn new_document_id(&self) -> String;
}
