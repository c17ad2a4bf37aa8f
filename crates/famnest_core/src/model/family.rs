//! Family group and membership records.

use crate::model::role::Role;
use crate::model::ActorId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a family group (the tenancy boundary).
pub type GroupId = Uuid;

/// Family group record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyGroup {
    pub id: GroupId,
    pub name: String,
    /// Code handed out to let new members join with role `member`.
    pub invite_code: String,
    pub created_by: ActorId,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// One actor's membership in one family group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: GroupId,
    pub user_id: ActorId,
    pub role: Role,
    /// Unix epoch milliseconds.
    pub joined_at: i64,
}
