//! Resource repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the shared `resources` table for all six kinds.
//! - Enforce the permission decision table on every mutation.
//!
//! # Invariants
//! - Every mutation resolves the actor's role from `memberships` and runs
//!   `PermissionEngine::evaluate` before touching data, regardless of what a
//!   client-side engine allowed.
//! - `visibility` changes only through `set_visibility`; generic updates
//!   never write it.
//! - `created_by` is written once on insert; `updated_by`/`updated_at` are
//!   rewritten on every mutation.

use crate::model::family::GroupId;
use crate::model::resource::{
    validate_title, Resource, ResourceId, ResourceKind, ResourceRecord, Visibility,
};
use crate::permission::engine::{Action, PermissionEngine};
use crate::repo::family_repo::query_role;
use crate::repo::{ensure_connection_ready, parse_uuid_column, RepoError, RepoResult};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const RESOURCE_SELECT_SQL: &str = "SELECT
    id,
    group_id,
    kind,
    title,
    body,
    created_by,
    visibility,
    created_at,
    updated_by,
    updated_at
FROM resources";

const RESOURCES_DEFAULT_LIMIT: u32 = 50;
const RESOURCES_LIMIT_MAX: u32 = 200;

/// Input for creating one resource. New resources always start public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResource {
    pub group_id: GroupId,
    pub kind: ResourceKind,
    pub title: String,
    pub body: String,
}

/// Field replacements for a generic update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceChanges {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl ResourceChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }
}

/// Query options for listing resources of one family group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceListQuery {
    pub group_id: GroupId,
    pub kind: Option<ResourceKind>,
    /// Defaults to 50 and clamps to 200.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ResourceListQuery {
    pub fn for_group(group_id: GroupId) -> Self {
        Self {
            group_id,
            kind: None,
            limit: None,
            offset: 0,
        }
    }
}

/// Repository interface for family-scoped resources.
pub trait ResourceRepository {
    fn create_resource(&self, actor_id: &str, draft: &NewResource) -> RepoResult<ResourceRecord>;
    fn update_resource(
        &self,
        actor_id: &str,
        resource_id: ResourceId,
        changes: &ResourceChanges,
    ) -> RepoResult<ResourceRecord>;
    /// Owner-only mutation, distinct from generic updates.
    fn set_visibility(
        &self,
        actor_id: &str,
        resource_id: ResourceId,
        visibility: Visibility,
    ) -> RepoResult<ResourceRecord>;
    fn delete_resource(&self, actor_id: &str, resource_id: ResourceId) -> RepoResult<()>;
    fn get_resource(&self, resource_id: ResourceId) -> RepoResult<Option<ResourceRecord>>;
    /// Lists resources newest-update first.
    fn list_resources(&self, query: &ResourceListQuery) -> RepoResult<Vec<ResourceRecord>>;
}

/// SQLite-backed resource repository.
pub struct SqliteResourceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteResourceRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Re-derives the actor's role and applies the decision table.
    fn authorize(
        &self,
        group_id: GroupId,
        actor_id: &str,
        action: Action,
        resource: Option<&ResourceRecord>,
    ) -> RepoResult<()> {
        let role = query_role(self.conn, group_id, actor_id)?;
        let engine = PermissionEngine::new(role, Some(actor_id.trim().to_string()));
        engine
            .evaluate(action, resource.map(|record| record as &dyn Resource))
            .into_result()
            .map_err(|reason| {
                warn!(
                    "event=resource_write module=repo status=denied action={} group_id={group_id} error_code={}",
                    action.as_str(),
                    reason.code()
                );
                RepoError::PermissionDenied(reason)
            })
    }

    fn require_resource(&self, resource_id: ResourceId) -> RepoResult<ResourceRecord> {
        self.get_resource(resource_id)?
            .ok_or(RepoError::ResourceNotFound(resource_id))
    }
}

impl ResourceRepository for SqliteResourceRepository<'_> {
    fn create_resource(&self, actor_id: &str, draft: &NewResource) -> RepoResult<ResourceRecord> {
        self.authorize(draft.group_id, actor_id, Action::Create, None)?;

        let mut record =
            ResourceRecord::new(draft.group_id, draft.kind, draft.title.as_str(), actor_id.trim());
        record.body = draft.body.clone();
        record.validate()?;

        self.conn.execute(
            "INSERT INTO resources (
                id,
                group_id,
                kind,
                title,
                body,
                created_by,
                visibility,
                updated_by,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?6, (strftime('%s', 'now') * 1000));",
            params![
                record.id.to_string(),
                record.group_id.to_string(),
                record.kind.as_str(),
                record.title.trim(),
                record.body.as_str(),
                record.created_by.as_deref(),
                record.visibility.as_str(),
            ],
        )?;

        info!(
            "event=resource_create module=repo status=ok kind={} group_id={}",
            record.kind.as_str(),
            record.group_id
        );
        self.require_resource(record.id)
    }

    fn update_resource(
        &self,
        actor_id: &str,
        resource_id: ResourceId,
        changes: &ResourceChanges,
    ) -> RepoResult<ResourceRecord> {
        let current = self.require_resource(resource_id)?;
        self.authorize(current.group_id, actor_id, Action::Modify, Some(&current))?;

        let title = match changes.title.as_deref() {
            Some(title) => {
                validate_title(title)?;
                title.trim().to_string()
            }
            None => current.title.clone(),
        };
        let body = changes.body.clone().unwrap_or_else(|| current.body.clone());

        self.conn.execute(
            "UPDATE resources
             SET
                title = ?2,
                body = ?3,
                updated_by = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![resource_id.to_string(), title, body, actor_id.trim()],
        )?;

        info!(
            "event=resource_update module=repo status=ok kind={} group_id={}",
            current.kind.as_str(),
            current.group_id
        );
        self.require_resource(resource_id)
    }

    fn set_visibility(
        &self,
        actor_id: &str,
        resource_id: ResourceId,
        visibility: Visibility,
    ) -> RepoResult<ResourceRecord> {
        let current = self.require_resource(resource_id)?;
        self.authorize(current.group_id, actor_id, Action::ChangeEditMode, None)?;

        self.conn.execute(
            "UPDATE resources
             SET
                visibility = ?2,
                updated_by = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![resource_id.to_string(), visibility.as_str(), actor_id.trim()],
        )?;

        info!(
            "event=resource_visibility module=repo status=ok visibility={} group_id={}",
            visibility.as_str(),
            current.group_id
        );
        self.require_resource(resource_id)
    }

    fn delete_resource(&self, actor_id: &str, resource_id: ResourceId) -> RepoResult<()> {
        let current = self.require_resource(resource_id)?;
        self.authorize(current.group_id, actor_id, Action::Delete, Some(&current))?;

        self.conn
            .execute("DELETE FROM resources WHERE id = ?1;", [resource_id.to_string()])?;

        info!(
            "event=resource_delete module=repo status=ok kind={} group_id={}",
            current.kind.as_str(),
            current.group_id
        );
        Ok(())
    }

    fn get_resource(&self, resource_id: ResourceId) -> RepoResult<Option<ResourceRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RESOURCE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([resource_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_resource_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_resources(&self, query: &ResourceListQuery) -> RepoResult<Vec<ResourceRecord>> {
        let mut sql = format!("{RESOURCE_SELECT_SQL} WHERE group_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(query.group_id.to_string())];

        if let Some(kind) = query.kind {
            sql.push_str(" AND kind = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        sql.push_str(" ORDER BY COALESCE(updated_at, created_at) DESC, id ASC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(normalize_resource_limit(
            query.limit,
        ))));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_resource_row(row)?);
        }
        Ok(items)
    }
}

/// Normalizes list limits: `None`/`0` -> default, oversized -> max.
pub fn normalize_resource_limit(limit: Option<u32>) -> u32 {
    match limit {
        None | Some(0) => RESOURCES_DEFAULT_LIMIT,
        Some(value) => value.min(RESOURCES_LIMIT_MAX),
    }
}

fn parse_resource_row(row: &Row<'_>) -> RepoResult<ResourceRecord> {
    let id_text: String = row.get("id")?;
    let group_text: String = row.get("group_id")?;

    let kind_text: String = row.get("kind")?;
    let kind = ResourceKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid resource kind `{kind_text}` in resources.kind"))
    })?;

    let visibility_text: String = row.get("visibility")?;
    let visibility = Visibility::parse(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in resources.visibility"
        ))
    })?;

    Ok(ResourceRecord {
        id: parse_uuid_column(&id_text, "resources.id")?,
        group_id: parse_uuid_column(&group_text, "resources.group_id")?,
        kind,
        title: row.get("title")?,
        body: row.get("body")?,
        created_by: row.get("created_by")?,
        visibility,
        created_at: row.get("created_at")?,
        updated_by: row.get("updated_by")?,
        updated_at: row.get("updated_at")?,
    })
}
