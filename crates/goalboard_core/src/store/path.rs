//! Hierarchical document paths (`users/{owner}/goals/{goal}/tasks/{id}`).
//!
//! # Invariants
//! - Every segment matches `[A-Za-z0-9_-]+`; `/` never appears inside one.
//! - Collection paths have an odd number of segments.

use super::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid segment regex"));

/// Path of a document collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Parses `a/b/c` into a collection path.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments: Vec<&str> = raw.trim().split('/').collect();
        if segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(format!(
                "collection path needs an odd number of segments: `{raw}`"
            )));
        }
        for segment in &segments {
            ensure_segment(segment)?;
        }
        Ok(Self(segments.join("/")))
    }

    /// `users/{owner}/goals/{goal}/tasks`.
    pub fn tasks(owner_id: &str, goal_id: &str) -> StoreResult<Self> {
        ensure_segment(owner_id)?;
        ensure_segment(goal_id)?;
        Ok(Self(format!("users/{owner_id}/goals/{goal_id}/tasks")))
    }

    /// `users/{owner}/goals`.
    pub fn goals(owner_id: &str) -> StoreResult<Self> {
        ensure_segment(owner_id)?;
        Ok(Self(format!("users/{owner_id}/goals")))
    }

    /// Path of one document inside this collection.
    pub fn doc(&self, doc_id: &str) -> StoreResult<DocumentPath> {
        ensure_segment(doc_id)?;
        Ok(DocumentPath {
            collection: self.clone(),
            doc_id: doc_id.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    doc_id: String,
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }
}

impl Display for DocumentPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.doc_id)
    }
}

/// Validates one path segment.
pub fn ensure_segment(segment: &str) -> StoreResult<()> {
    if SEGMENT_RE.is_match(segment) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(format!(
            "invalid path segment `{segment}`"
        )))
    }
}
