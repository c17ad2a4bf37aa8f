//! Family governance use-case service.
//!
//! # Responsibility
//! - Create family groups and admit members through invite codes.
//! - Gate membership/governance actions through owner-only predicates.
//!
//! # Invariants
//! - The creator of a group becomes its `owner`; invitees join as `member`.
//! - Roles change only by an `owner` and only by overwrite.
//! - A group always keeps at least one `owner`.

use crate::model::family::{FamilyGroup, GroupId, Membership};
use crate::model::role::Role;
use crate::permission::engine::{Action, DenyReason, PermissionEngine};
use crate::repo::family_repo::FamilyRepository;
use crate::repo::RepoError;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const FAMILY_NAME_MAX_CHARS: usize = 80;
const INVITE_CODE_LEN: usize = 8;
const INVITE_CODE_MAX_ATTEMPTS: usize = 5;

static INVITE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{8}$").expect("valid invite code regex"));
static CONTROL_CHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Cc}").expect("valid control char regex"));

/// Service error for family use-cases.
#[derive(Debug)]
pub enum FamilyServiceError {
    InvalidName(String),
    InvalidUserId,
    InvalidInviteCode(String),
    InviteCodeNotFound,
    GroupNotFound(GroupId),
    AlreadyMember(GroupId),
    NotMember(GroupId),
    /// Acting user lacks the role for this governance action.
    Denied(DenyReason),
    /// Operation would leave the group without an owner.
    LastOwner(GroupId),
    /// Could not find an unused invite code.
    InviteCodeExhausted,
    Repo(RepoError),
}

impl Display for FamilyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "invalid family name: `{value}`"),
            Self::InvalidUserId => write!(f, "user id must not be empty"),
            Self::InvalidInviteCode(value) => write!(f, "invalid invite code: `{value}`"),
            Self::InviteCodeNotFound => write!(f, "invite code does not match any family"),
            Self::GroupNotFound(id) => write!(f, "family group not found: {id}"),
            Self::AlreadyMember(id) => write!(f, "already a member of family group {id}"),
            Self::NotMember(id) => write!(f, "not a member of family group {id}"),
            Self::Denied(reason) => write!(f, "{reason}"),
            Self::LastOwner(id) => {
                write!(f, "family group {id} must keep at least one owner")
            }
            Self::InviteCodeExhausted => write!(f, "failed to allocate a unique invite code"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FamilyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for FamilyServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::GroupNotFound(id) => Self::GroupNotFound(id),
            RepoError::DuplicateMembership { group_id, .. } => Self::AlreadyMember(group_id),
            RepoError::MembershipNotFound { group_id, .. } => Self::NotMember(group_id),
            RepoError::PermissionDenied(reason) => Self::Denied(reason),
            other => Self::Repo(other),
        }
    }
}

pub type FamilyServiceResult<T> = Result<T, FamilyServiceError>;

/// Family service facade over repository implementations.
pub struct FamilyService<R: FamilyRepository> {
    repo: R,
}

impl<R: FamilyRepository> FamilyService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Builds a fresh engine from the role currently stored for the user.
    pub fn engine_for(&self, group_id: GroupId, user_id: &str) -> FamilyServiceResult<PermissionEngine> {
        let role = self.repo.resolve_role(group_id, user_id)?;
        Ok(PermissionEngine::new(role, Some(user_id.trim().to_string())))
    }

    /// Creates a family group owned by `creator_id`.
    pub fn create_family(&self, creator_id: &str, name: &str) -> FamilyServiceResult<FamilyGroup> {
        let creator_id = normalize_user_id(creator_id)?;
        let name = normalize_family_name(name)?;
        let invite_code = self.allocate_invite_code()?;

        let group = self.repo.create_group(&FamilyGroup {
            id: Uuid::new_v4(),
            name,
            invite_code,
            created_by: creator_id,
            created_at: 0,
        })?;
        info!(
            "event=family_create module=service status=ok group_id={}",
            group.id
        );
        Ok(group)
    }

    /// Joins the family matching `invite_code` with role `member`.
    pub fn join_with_invite_code(
        &self,
        user_id: &str,
        invite_code: &str,
    ) -> FamilyServiceResult<Membership> {
        let user_id = normalize_user_id(user_id)?;
        let code = normalize_invite_code(invite_code)?;
        let group = self
            .repo
            .find_group_by_invite_code(&code)?
            .ok_or(FamilyServiceError::InviteCodeNotFound)?;

        let membership = self.repo.add_member(group.id, &user_id, Role::Member)?;
        info!(
            "event=family_join module=service status=ok group_id={}",
            group.id
        );
        Ok(membership)
    }

    /// Overwrites the role of `target_user_id`. Owner-only.
    pub fn change_role(
        &self,
        actor_id: &str,
        group_id: GroupId,
        target_user_id: &str,
        role: Role,
    ) -> FamilyServiceResult<Membership> {
        self.authorize(group_id, actor_id, Action::ChangeRoles)?;
        let target = self.require_member(group_id, target_user_id)?;

        if target.role == role {
            return Ok(target);
        }
        if target.role == Role::Owner {
            self.ensure_other_owner_remains(group_id)?;
        }

        Ok(self.repo.set_role(group_id, &target.user_id, role)?)
    }

    /// Removes another member from the group. Owner-only.
    pub fn remove_member(
        &self,
        actor_id: &str,
        group_id: GroupId,
        target_user_id: &str,
    ) -> FamilyServiceResult<()> {
        self.authorize(group_id, actor_id, Action::ManageMembers)?;
        let target = self.require_member(group_id, target_user_id)?;
        if target.role == Role::Owner {
            self.ensure_other_owner_remains(group_id)?;
        }
        Ok(self.repo.remove_member(group_id, &target.user_id)?)
    }

    /// Removes the caller's own membership.
    pub fn leave_family(&self, user_id: &str, group_id: GroupId) -> FamilyServiceResult<()> {
        let membership = self.require_member(group_id, user_id)?;
        if membership.role == Role::Owner {
            self.ensure_other_owner_remains(group_id)?;
        }
        self.repo.remove_member(group_id, &membership.user_id)?;
        info!("event=family_leave module=service status=ok group_id={group_id}");
        Ok(())
    }

    /// Replaces the invite code, invalidating the previous one. Owner-only.
    pub fn regenerate_invite_code(
        &self,
        actor_id: &str,
        group_id: GroupId,
    ) -> FamilyServiceResult<String> {
        self.authorize(group_id, actor_id, Action::InviteMembers)?;
        let code = self.allocate_invite_code()?;
        self.repo.set_invite_code(group_id, &code)?;
        Ok(code)
    }

    /// Renames the group. Owner-only.
    pub fn rename_family(
        &self,
        actor_id: &str,
        group_id: GroupId,
        name: &str,
    ) -> FamilyServiceResult<FamilyGroup> {
        self.authorize(group_id, actor_id, Action::ManageFamilySettings)?;
        let name = normalize_family_name(name)?;
        self.repo.rename_group(group_id, &name)?;
        self.repo
            .get_group(group_id)?
            .ok_or(FamilyServiceError::GroupNotFound(group_id))
    }

    /// Lists members of a group the caller belongs to (any role).
    pub fn list_members(
        &self,
        actor_id: &str,
        group_id: GroupId,
    ) -> FamilyServiceResult<Vec<Membership>> {
        self.require_group(group_id)?;
        if self.repo.resolve_role(group_id, actor_id)?.is_none() {
            return Err(FamilyServiceError::Denied(DenyReason::Unauthenticated));
        }
        Ok(self.repo.list_members(group_id)?)
    }

    fn authorize(
        &self,
        group_id: GroupId,
        actor_id: &str,
        action: Action,
    ) -> FamilyServiceResult<()> {
        self.require_group(group_id)?;
        let engine = self.engine_for(group_id, actor_id)?;
        engine
            .evaluate(action, None)
            .into_result()
            .map_err(|reason| {
                warn!(
                    "event=family_governance module=service status=denied action={} group_id={group_id} error_code={}",
                    action.as_str(),
                    reason.code()
                );
                FamilyServiceError::Denied(reason)
            })
    }

    fn require_group(&self, group_id: GroupId) -> FamilyServiceResult<FamilyGroup> {
        self.repo
            .get_group(group_id)?
            .ok_or(FamilyServiceError::GroupNotFound(group_id))
    }

    fn require_member(&self, group_id: GroupId, user_id: &str) -> FamilyServiceResult<Membership> {
        let user_id = normalize_user_id(user_id)?;
        self.repo
            .get_membership(group_id, &user_id)?
            .ok_or(FamilyServiceError::NotMember(group_id))
    }

    fn ensure_other_owner_remains(&self, group_id: GroupId) -> FamilyServiceResult<()> {
        if self.repo.count_owners(group_id)? <= 1 {
            return Err(FamilyServiceError::LastOwner(group_id));
        }
        Ok(())
    }

    fn allocate_invite_code(&self) -> FamilyServiceResult<String> {
        for _ in 0..INVITE_CODE_MAX_ATTEMPTS {
            let code = generate_invite_code();
            if self.repo.find_group_by_invite_code(&code)?.is_none() {
                return Ok(code);
            }
        }
        Err(FamilyServiceError::InviteCodeExhausted)
    }
}

/// Generates one random 8-char invite code of `[0-9A-F]`.
pub fn generate_invite_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .to_ascii_uppercase()
        .chars()
        .take(INVITE_CODE_LEN)
        .collect()
}

/// Trims and uppercases user input, then checks the `[A-Z0-9]{8}` shape.
pub fn normalize_invite_code(value: &str) -> FamilyServiceResult<String> {
    let normalized = value.trim().to_ascii_uppercase();
    if !INVITE_CODE_RE.is_match(&normalized) {
        return Err(FamilyServiceError::InvalidInviteCode(value.to_string()));
    }
    Ok(normalized)
}

/// Trims the name and checks 1..=80 chars without control characters.
pub fn normalize_family_name(value: &str) -> FamilyServiceResult<String> {
    let trimmed = value.trim();
    let chars = trimmed.chars().count();
    if chars == 0 || chars > FAMILY_NAME_MAX_CHARS || CONTROL_CHAR_RE.is_match(trimmed) {
        return Err(FamilyServiceError::InvalidName(value.to_string()));
    }
    Ok(trimmed.to_string())
}

fn normalize_user_id(value: &str) -> FamilyServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FamilyServiceError::InvalidUserId);
    }
    Ok(trimmed.to_string())
}
