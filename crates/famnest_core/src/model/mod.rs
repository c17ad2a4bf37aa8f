//! Family-scoped domain model.
//!
//! # Responsibility
//! - Define canonical data structures read by the permission engine.
//! - Keep one resource shape for notes, cards, documents, events, lists and
//!   subscriptions.
//!
//! # Invariants
//! - Roles and visibility are closed enumerations, never free-form strings.
//! - `created_by` is immutable once a resource is persisted.
//!
//! # See also
//! - docs/architecture/permissions.md

pub mod family;
pub mod resource;
pub mod role;

/// Opaque, stable identity token of an acting user.
pub type ActorId = String;
