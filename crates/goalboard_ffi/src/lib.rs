//! Flutter-facing bindings for `goalboard_core`.

pub mod api;
