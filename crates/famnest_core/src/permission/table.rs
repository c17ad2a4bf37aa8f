//! Exhaustive decision table derived from `PermissionEngine::evaluate`.
//!
//! The table is the single artifact both sides of the trust boundary agree
//! on: UI gating and storage enforcement call the same `evaluate`, and this
//! module enumerates it for review, export and property tests.

use crate::model::resource::{Resource, ResourceAttributes, Visibility};
use crate::model::role::Role;
use crate::permission::engine::{Action, PermissionDecision, PermissionEngine};
use std::fmt::{Display, Formatter};

const TABLE_ACTOR_ID: &str = "actor";
const TABLE_OTHER_ID: &str = "other";

/// Relationship between the acting user and a resource's creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Actor created the resource.
    Creator,
    /// Someone else created the resource.
    Other,
    /// Resource has no recorded creator.
    Unattributed,
}

impl Ownership {
    pub const ALL: [Ownership; 3] = [Ownership::Creator, Ownership::Other, Ownership::Unattributed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Other => "other",
            Self::Unattributed => "unattributed",
        }
    }

    fn created_by(self) -> Option<&'static str> {
        match self {
            Self::Creator => Some(TABLE_ACTOR_ID),
            Self::Other => Some(TABLE_OTHER_ID),
            Self::Unattributed => None,
        }
    }
}

/// One evaluated combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionRow {
    /// `None` means unauthenticated or not a member.
    pub role: Option<Role>,
    pub action: Action,
    /// Set only for resource-targeted actions.
    pub ownership: Option<Ownership>,
    /// Set only for resource-targeted actions.
    pub visibility: Option<Visibility>,
    pub decision: PermissionDecision,
}

impl Display for DecisionRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "role={} action={} ownership={} visibility={} decision={}",
            self.role.map_or("none", Role::as_str),
            self.action,
            self.ownership.map_or("-", Ownership::as_str),
            self.visibility.map_or("-", Visibility::as_str),
            if self.decision.is_allowed() { "allow" } else { "deny" },
        )?;
        if let Some(reason) = self.decision.reason() {
            write!(f, " reason=\"{reason}\"")?;
        }
        Ok(())
    }
}

/// Enumerates every (role, action, ownership, visibility) combination.
///
/// Ordering is stable: roles from none to owner, then actions, ownership and
/// visibility in declaration order.
pub fn decision_table() -> Vec<DecisionRow> {
    let roles = std::iter::once(None).chain(Role::ALL.into_iter().map(Some));
    let mut rows = Vec::new();

    for role in roles {
        let engine = match role {
            Some(role) => PermissionEngine::for_actor(role, TABLE_ACTOR_ID),
            None => PermissionEngine::unauthenticated(),
        };

        for action in Action::ALL {
            if !action.needs_resource() {
                rows.push(DecisionRow {
                    role,
                    action,
                    ownership: None,
                    visibility: None,
                    decision: engine.evaluate(action, None),
                });
                continue;
            }

            for ownership in Ownership::ALL {
                for visibility in Visibility::ALL {
                    let resource = ResourceAttributes::new(ownership.created_by(), visibility);
                    rows.push(DecisionRow {
                        role,
                        action,
                        ownership: Some(ownership),
                        visibility: Some(visibility),
                        decision: engine.evaluate(action, Some(&resource as &dyn Resource)),
                    });
                }
            }
        }
    }

    rows
}
