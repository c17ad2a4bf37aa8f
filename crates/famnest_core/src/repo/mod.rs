//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the role store, family and resource data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the latest schema.
//! - Resource mutations re-derive the actor's role from storage and apply
//!   `PermissionEngine::evaluate` before writing; this is the trust boundary.
//! - Repository APIs return semantic errors (`*NotFound`, `PermissionDenied`)
//!   in addition to DB transport errors.

use crate::db::migrations::latest_version;
use crate::db::{schema_version, DbError};
use crate::model::family::GroupId;
use crate::model::resource::{ResourceId, ResourceValidationError};
use crate::model::ActorId;
use crate::permission::engine::DenyReason;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod family_repo;
pub mod resource_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for family and resource persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(ResourceValidationError),
    Db(DbError),
    GroupNotFound(GroupId),
    ResourceNotFound(ResourceId),
    MembershipNotFound { group_id: GroupId, user_id: ActorId },
    DuplicateMembership { group_id: GroupId, user_id: ActorId },
    /// Storage refused the mutation after re-deriving the actor's role.
    PermissionDenied(DenyReason),
    InvalidData(String),
    UninitializedConnection { expected_version: u32, actual_version: u32 },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::GroupNotFound(id) => write!(f, "family group not found: {id}"),
            Self::ResourceNotFound(id) => write!(f, "resource not found: {id}"),
            Self::MembershipNotFound { group_id, user_id } => {
                write!(f, "user `{user_id}` is not a member of family group {group_id}")
            }
            Self::DuplicateMembership { group_id, user_id } => {
                write!(f, "user `{user_id}` is already a member of family group {group_id}")
            }
            Self::PermissionDenied(reason) => write!(f, "permission denied: {reason}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match required {expected_version}; open it through db::open_db"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceValidationError> for RepoError {
    fn from(value: ResourceValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects connections that did not go through `db::open_db*`.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

pub(crate) fn parse_uuid_column(value: &str, column: &str) -> RepoResult<uuid::Uuid> {
    uuid::Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}
