//! Core use-case services.
//!
//! # Responsibility
//! - Own the live task snapshot and the mutations applied to it.
//! - Orchestrate ordering, suggestion adoption and goal persistence.
//! - Keep FFI/CLI layers decoupled from the document store.

pub mod board;
pub mod goal_service;
pub mod ordering;
pub mod suggestion_flow;
pub mod task_store;
