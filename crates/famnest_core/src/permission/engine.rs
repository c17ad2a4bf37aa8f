//! Stateless permission engine.

use crate::model::resource::{Resource, Visibility};
use crate::model::role::Role;
use crate::model::ActorId;
use std::fmt::{Display, Formatter};

/// Action gated by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Modify,
    Delete,
    /// Toggle a resource between public and private.
    ChangeEditMode,
    ManageMembers,
    ManageFamilySettings,
    InviteMembers,
    ChangeRoles,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Create,
        Action::Modify,
        Action::Delete,
        Action::ChangeEditMode,
        Action::ManageMembers,
        Action::ManageFamilySettings,
        Action::InviteMembers,
        Action::ChangeRoles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::ChangeEditMode => "change_edit_mode",
            Self::ManageMembers => "manage_members",
            Self::ManageFamilySettings => "manage_family_settings",
            Self::InviteMembers => "invite_members",
            Self::ChangeRoles => "change_roles",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == value.trim())
    }

    /// Whether the action targets one concrete resource.
    pub fn needs_resource(self) -> bool {
        matches!(self, Self::Modify | Self::Delete)
    }

    /// Whether the action is reserved for the family owner.
    pub fn is_governance(self) -> bool {
        matches!(
            self,
            Self::ChangeEditMode
                | Self::ManageMembers
                | Self::ManageFamilySettings
                | Self::InviteMembers
                | Self::ChangeRoles
        )
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an action was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// Role or actor identity is missing.
    Unauthenticated,
    /// The role lacks the static privilege for the action.
    InsufficientRole { action: Action },
    /// A member tried to delete a resource created by someone else.
    OwnershipMismatch,
    /// A member tried to modify a private resource created by someone else.
    VisibilityRestricted,
}

impl DenyReason {
    /// User-facing message, stable for UI display.
    pub fn message(self) -> &'static str {
        match self {
            Self::Unauthenticated => "not authenticated",
            Self::InsufficientRole { action } => match action {
                Action::Create => "viewers cannot create resources",
                Action::Modify => "viewers cannot modify resources",
                Action::Delete => "viewers cannot delete resources",
                Action::ChangeEditMode => "only the family owner may change edit mode",
                Action::ManageMembers => "only the family owner may manage members",
                Action::ManageFamilySettings => {
                    "only the family owner may manage family settings"
                }
                Action::InviteMembers => "only the family owner may invite members",
                Action::ChangeRoles => "only the family owner may change roles",
            },
            Self::OwnershipMismatch => "you can only delete resources you created",
            Self::VisibilityRestricted => "resource is private; only the owner may modify it",
        }
    }

    /// Stable machine-readable code for logs.
    pub fn code(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InsufficientRole { .. } => "insufficient_role",
            Self::OwnershipMismatch => "ownership_mismatch",
            Self::VisibilityRestricted => "visibility_restricted",
        }
    }
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of one permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionDecision {
    Allowed,
    Denied(DenyReason),
}

impl PermissionDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Denial message, `None` when allowed.
    pub fn reason(self) -> Option<&'static str> {
        self.deny_reason().map(DenyReason::message)
    }

    pub fn deny_reason(self) -> Option<DenyReason> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(reason),
        }
    }

    /// Converts into `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied(reason) => Err(reason),
        }
    }
}

/// Immutable permission context for one actor in one family group.
///
/// Construct a new engine whenever the actor's role changes; never mutate one
/// in place. Decisions are advisory for UI gating and must be re-applied by
/// storage before any mutation commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionEngine {
    role: Option<Role>,
    actor_id: Option<ActorId>,
}

impl PermissionEngine {
    /// Creates an engine. Blank actor ids are treated as unauthenticated.
    pub fn new(role: Option<Role>, actor_id: Option<ActorId>) -> Self {
        let actor_id = actor_id.filter(|value| !value.trim().is_empty());
        Self { role, actor_id }
    }

    /// Engine for an authenticated actor with a known role.
    pub fn for_actor(role: Role, actor_id: impl Into<ActorId>) -> Self {
        Self::new(Some(role), Some(actor_id.into()))
    }

    /// Engine with neither role nor identity.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    /// Single decision function behind every predicate.
    ///
    /// `resource` is consulted only for `Modify` and `Delete`; when it is
    /// absent for those actions the resource is treated as having no creator
    /// and default visibility.
    pub fn evaluate(&self, action: Action, resource: Option<&dyn Resource>) -> PermissionDecision {
        let Some(role) = self.role else {
            return PermissionDecision::Denied(DenyReason::Unauthenticated);
        };

        if action.needs_resource() {
            let Some(actor_id) = self.actor_id.as_deref() else {
                return PermissionDecision::Denied(DenyReason::Unauthenticated);
            };
            let created_by = resource.and_then(|r| r.created_by());
            let visibility = resource.map_or(Visibility::default(), |r| r.visibility());
            return decide_resource_action(role, action, actor_id, created_by, visibility);
        }

        let allowed = if action.is_governance() {
            role == Role::Owner
        } else {
            role != Role::Viewer
        };
        if allowed {
            PermissionDecision::Allowed
        } else {
            PermissionDecision::Denied(DenyReason::InsufficientRole { action })
        }
    }

    /// True iff the role is `owner` or `member`.
    pub fn can_create(&self) -> bool {
        self.evaluate(Action::Create, None).is_allowed()
    }

    pub fn can_modify(&self, resource: &impl Resource) -> PermissionDecision {
        self.evaluate(Action::Modify, Some(resource as &dyn Resource))
    }

    pub fn can_delete(&self, resource: &impl Resource) -> PermissionDecision {
        self.evaluate(Action::Delete, Some(resource as &dyn Resource))
    }

    /// Gates the public/private toggle.
    pub fn can_change_edit_mode(&self) -> bool {
        self.is_owner()
    }

    pub fn can_manage_members(&self) -> bool {
        self.is_owner()
    }

    pub fn can_manage_family_settings(&self) -> bool {
        self.is_owner()
    }

    pub fn can_invite_members(&self) -> bool {
        self.is_owner()
    }

    pub fn can_change_roles(&self) -> bool {
        self.is_owner()
    }

    pub fn is_owner(&self) -> bool {
        self.role == Some(Role::Owner)
    }

    pub fn is_member(&self) -> bool {
        self.role == Some(Role::Member)
    }

    pub fn is_viewer(&self) -> bool {
        self.role == Some(Role::Viewer)
    }
}

fn decide_resource_action(
    role: Role,
    action: Action,
    actor_id: &str,
    created_by: Option<&str>,
    visibility: Visibility,
) -> PermissionDecision {
    let is_creator = created_by == Some(actor_id);
    match role {
        Role::Owner => PermissionDecision::Allowed,
        Role::Viewer => PermissionDecision::Denied(DenyReason::InsufficientRole { action }),
        Role::Member if is_creator => PermissionDecision::Allowed,
        Role::Member => match (action, visibility) {
            (Action::Modify, Visibility::Public) => PermissionDecision::Allowed,
            (Action::Modify, Visibility::Private) => {
                PermissionDecision::Denied(DenyReason::VisibilityRestricted)
            }
            _ => PermissionDecision::Denied(DenyReason::OwnershipMismatch),
        },
    }
}
