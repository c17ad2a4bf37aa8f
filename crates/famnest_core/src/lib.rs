//! Core domain logic for famnest, a family organizer.
//! This crate is the single source of truth for permission invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod permission;
pub mod repo;
pub mod service;
pub mod sync;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::family::{FamilyGroup, GroupId, Membership};
pub use model::resource::{
    Resource, ResourceAttributes, ResourceId, ResourceKind, ResourceRecord,
    ResourceValidationError, Visibility,
};
pub use model::role::{parse_role, Role, RoleParseError};
pub use model::ActorId;
pub use permission::engine::{Action, DenyReason, PermissionDecision, PermissionEngine};
pub use permission::table::{decision_table, DecisionRow, Ownership};
pub use permission::watch::PermissionWatch;
pub use repo::family_repo::{FamilyRepository, RoleStore, SqliteFamilyRepository};
pub use repo::resource_repo::{
    NewResource, ResourceChanges, ResourceListQuery, ResourceRepository,
    SqliteResourceRepository,
};
pub use repo::{RepoError, RepoResult};
pub use service::family_service::{FamilyService, FamilyServiceError};
pub use service::resource_service::{ResourceService, ResourceServiceError};
pub use sync::role_feed::{RoleChange, RoleChangeCallback, RoleChangeFeed, SubscriptionId};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
