//! Repository layer: domain-shaped access over the document store.
//!
//! # Invariants
//! - Service code never builds document field maps by hand.

pub mod task_repo;
