//! Domain model for goals and their task collections.
//!
//! # Invariants
//! - Every task belongs to exactly one goal's collection.
//! - Field-level validation happens here, before any store I/O.

pub mod goal;
pub mod task;
