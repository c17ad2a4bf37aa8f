//! Membership role model.
//!
//! # Invariants
//! - Exactly one role is active per (actor, family group).
//! - Privilege order is `Viewer < Member < Owner`; variant order encodes it.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Role of one actor inside one family group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// Creates resources, edits own and public ones, deletes own ones.
    Member,
    /// Unconditional access plus every governance action.
    Owner,
}

impl Role {
    /// All roles in ascending privilege order.
    pub const ALL: [Role; 3] = [Role::Viewer, Role::Member, Role::Owner];

    /// Stable storage/wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses one role from its stable lowercase value.
///
/// Surrounding whitespace is ignored; casing is not.
pub fn parse_role(value: &str) -> Result<Role, RoleParseError> {
    match value.trim() {
        "" => Err(RoleParseError::Empty),
        "owner" => Ok(Role::Owner),
        "member" => Ok(Role::Member),
        "viewer" => Ok(Role::Viewer),
        other => Err(RoleParseError::Unsupported(other.to_string())),
    }
}

/// Role parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleParseError {
    Empty,
    Unsupported(String),
}

impl Display for RoleParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "role value must not be empty"),
            Self::Unsupported(value) => {
                write!(f, "unsupported role `{value}`; expected owner|member|viewer")
            }
        }
    }
}

impl Error for RoleParseError {}
