//! Flutter-facing bindings for famnest core.

pub mod api;
