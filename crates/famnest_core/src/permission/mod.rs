//! Role-based permission decisions for family-scoped resources.
//!
//! # Responsibility
//! - Classify (role, actor, resource ownership/visibility) into allow/deny.
//! - Keep decisions pure so they can be re-evaluated after any role change.
//!
//! # Invariants
//! - The engine never errors; denial is a value carrying a reason.
//! - Client-side decisions are advisory. Storage re-applies the same
//!   `PermissionEngine::evaluate` before committing any mutation.
//!
//! # See also
//! - docs/architecture/permissions.md

pub mod engine;
pub mod table;
pub mod watch;
