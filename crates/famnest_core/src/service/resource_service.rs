//! Resource use-case service.
//!
//! # Responsibility
//! - Pre-validate resource actions with the caller's current engine.
//! - Separate client-side denials (with a reason) from storage rejections.
//!
//! # Invariants
//! - A denied engine check never reaches the repository.
//! - A storage rejection after a client-side allow (stale engine) surfaces as
//!   the generic `PermissionDenied`, distinct from validation/storage errors.

use crate::model::resource::{ResourceId, ResourceRecord, ResourceValidationError, Visibility};
use crate::permission::engine::{Action, DenyReason, PermissionDecision, PermissionEngine};
use crate::repo::resource_repo::{
    NewResource, ResourceChanges, ResourceListQuery, ResourceRepository,
};
use crate::repo::{RepoError, RepoResult};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for resource use-cases.
#[derive(Debug)]
pub enum ResourceServiceError {
    /// The caller's engine denied the action; carries the user-facing reason.
    Denied(DenyReason),
    /// Storage rejected an action the caller's engine allowed.
    PermissionDenied,
    NotFound(ResourceId),
    Validation(ResourceValidationError),
    Repo(RepoError),
}

impl Display for ResourceServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denied(reason) => write!(f, "{reason}"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::NotFound(id) => write!(f, "resource not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResourceServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ResourceServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::PermissionDenied(reason) => {
                warn!(
                    "event=resource_write module=service status=rejected error_code=stale_permission reason_code={}",
                    reason.code()
                );
                Self::PermissionDenied
            }
            RepoError::ResourceNotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type ResourceServiceResult<T> = Result<T, ResourceServiceError>;

/// Resource service facade over repository implementations.
pub struct ResourceService<R: ResourceRepository> {
    repo: R,
}

impl<R: ResourceRepository> ResourceService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a public resource authored by the engine's actor.
    pub fn create(
        &self,
        engine: &PermissionEngine,
        draft: &NewResource,
    ) -> ResourceServiceResult<ResourceRecord> {
        check(engine.evaluate(Action::Create, None))?;
        let actor_id = require_actor(engine)?;
        Ok(self.repo.create_resource(actor_id, draft)?)
    }

    /// Applies title/body changes. Visibility is never touched here.
    pub fn update(
        &self,
        engine: &PermissionEngine,
        resource_id: ResourceId,
        changes: &ResourceChanges,
    ) -> ResourceServiceResult<ResourceRecord> {
        let current = self.require(resource_id)?;
        check(engine.can_modify(&current))?;
        let actor_id = require_actor(engine)?;
        if changes.is_empty() {
            return Ok(current);
        }
        Ok(self.repo.update_resource(actor_id, resource_id, changes)?)
    }

    /// Toggles public/private. Owner-only.
    pub fn set_visibility(
        &self,
        engine: &PermissionEngine,
        resource_id: ResourceId,
        visibility: Visibility,
    ) -> ResourceServiceResult<ResourceRecord> {
        check(engine.evaluate(Action::ChangeEditMode, None))?;
        let actor_id = require_actor(engine)?;
        Ok(self.repo.set_visibility(actor_id, resource_id, visibility)?)
    }

    pub fn delete(
        &self,
        engine: &PermissionEngine,
        resource_id: ResourceId,
    ) -> ResourceServiceResult<()> {
        let current = self.require(resource_id)?;
        check(engine.can_delete(&current))?;
        let actor_id = require_actor(engine)?;
        Ok(self.repo.delete_resource(actor_id, resource_id)?)
    }

    pub fn get(&self, resource_id: ResourceId) -> RepoResult<Option<ResourceRecord>> {
        self.repo.get_resource(resource_id)
    }

    pub fn list(&self, query: &ResourceListQuery) -> RepoResult<Vec<ResourceRecord>> {
        self.repo.list_resources(query)
    }

    fn require(&self, resource_id: ResourceId) -> ResourceServiceResult<ResourceRecord> {
        self.repo
            .get_resource(resource_id)?
            .ok_or(ResourceServiceError::NotFound(resource_id))
    }
}

fn check(decision: PermissionDecision) -> ResourceServiceResult<()> {
    decision.into_result().map_err(ResourceServiceError::Denied)
}

fn require_actor(engine: &PermissionEngine) -> ResourceServiceResult<&str> {
    engine
        .actor_id()
        .ok_or(ResourceServiceError::Denied(DenyReason::Unauthenticated))
}
