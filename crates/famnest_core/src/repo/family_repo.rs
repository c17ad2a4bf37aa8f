//! Role store and family membership repository.
//!
//! # Responsibility
//! - Resolve an actor's role per family group from the `memberships` table.
//! - Persist group/membership writes and publish role changes after commit.
//!
//! # Invariants
//! - Group creation inserts the creator as `owner` in the same transaction.
//! - Role changes overwrite the single membership row; they are never additive.
//! - `resolve_role` returns `Ok(None)` for non-members and blank user ids.

use crate::model::family::{FamilyGroup, GroupId, Membership};
use crate::model::role::{parse_role, Role};
use crate::repo::{ensure_connection_ready, parse_uuid_column, RepoError, RepoResult};
use crate::sync::role_feed::{RoleChange, RoleChangeCallback, RoleChangeFeed, SubscriptionId};
use log::info;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::sync::Arc;

const GROUP_SELECT_SQL: &str = "SELECT id, name, invite_code, created_by, created_at FROM family_groups";
const MEMBERSHIP_SELECT_SQL: &str = "SELECT group_id, user_id, role, joined_at FROM memberships";

/// Resolves and watches an actor's role within one family group.
pub trait RoleStore {
    /// Returns the active role, or `None` for non-members.
    fn resolve_role(&self, group_id: GroupId, user_id: &str) -> RepoResult<Option<Role>>;
    /// Registers a callback fired with the new role whenever the membership
    /// record of (group, user) changes. Removal delivers `None`.
    fn subscribe_to_role_changes(
        &self,
        group_id: GroupId,
        user_id: &str,
        callback: RoleChangeCallback,
    ) -> SubscriptionId;
    /// Cancels one subscription. Returns `false` when it was unknown.
    fn unsubscribe(&self, subscription_id: SubscriptionId) -> bool;
}

/// Repository interface for family groups and memberships.
pub trait FamilyRepository: RoleStore {
    /// Inserts the group and its creator's `owner` membership atomically.
    fn create_group(&self, group: &FamilyGroup) -> RepoResult<FamilyGroup>;
    fn get_group(&self, group_id: GroupId) -> RepoResult<Option<FamilyGroup>>;
    fn find_group_by_invite_code(&self, invite_code: &str) -> RepoResult<Option<FamilyGroup>>;
    fn rename_group(&self, group_id: GroupId, name: &str) -> RepoResult<()>;
    fn set_invite_code(&self, group_id: GroupId, invite_code: &str) -> RepoResult<()>;
    fn add_member(&self, group_id: GroupId, user_id: &str, role: Role) -> RepoResult<Membership>;
    /// Overwrites the role of an existing membership.
    fn set_role(&self, group_id: GroupId, user_id: &str, role: Role) -> RepoResult<Membership>;
    fn remove_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<()>;
    fn get_membership(&self, group_id: GroupId, user_id: &str) -> RepoResult<Option<Membership>>;
    /// Lists memberships ordered by role (owners first), then join time.
    fn list_members(&self, group_id: GroupId) -> RepoResult<Vec<Membership>>;
    fn count_owners(&self, group_id: GroupId) -> RepoResult<u32>;
}

/// SQLite-backed family repository and role store.
pub struct SqliteFamilyRepository<'conn> {
    conn: &'conn Connection,
    feed: Arc<RoleChangeFeed>,
}

impl<'conn> SqliteFamilyRepository<'conn> {
    /// Constructs a repository from a migrated connection and a shared feed.
    pub fn try_new(conn: &'conn Connection, feed: Arc<RoleChangeFeed>) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, feed })
    }

    pub fn feed(&self) -> &Arc<RoleChangeFeed> {
        &self.feed
    }

    fn publish(&self, group_id: GroupId, user_id: &str, role: Option<Role>) {
        self.feed.publish(&RoleChange {
            group_id,
            user_id: user_id.to_string(),
            role,
        });
    }

    fn require_membership(&self, group_id: GroupId, user_id: &str) -> RepoResult<Membership> {
        self.get_membership(group_id, user_id)?
            .ok_or_else(|| RepoError::MembershipNotFound {
                group_id,
                user_id: user_id.to_string(),
            })
    }
}

impl RoleStore for SqliteFamilyRepository<'_> {
    fn resolve_role(&self, group_id: GroupId, user_id: &str) -> RepoResult<Option<Role>> {
        query_role(self.conn, group_id, user_id)
    }

    fn subscribe_to_role_changes(
        &self,
        group_id: GroupId,
        user_id: &str,
        callback: RoleChangeCallback,
    ) -> SubscriptionId {
        self.feed.subscribe(group_id, user_id, callback)
    }

    fn unsubscribe(&self, subscription_id: SubscriptionId) -> bool {
        self.feed.unsubscribe(subscription_id)
    }
}

impl FamilyRepository for SqliteFamilyRepository<'_> {
    fn create_group(&self, group: &FamilyGroup) -> RepoResult<FamilyGroup> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO family_groups (id, name, invite_code, created_by)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                group.id.to_string(),
                group.name.as_str(),
                group.invite_code.as_str(),
                group.created_by.as_str(),
            ],
        )?;
        tx.execute(
            "INSERT INTO memberships (group_id, user_id, role) VALUES (?1, ?2, ?3);",
            params![
                group.id.to_string(),
                group.created_by.as_str(),
                Role::Owner.as_str()
            ],
        )?;
        tx.commit()?;

        info!(
            "event=family_create module=repo status=ok group_id={}",
            group.id
        );
        self.publish(group.id, &group.created_by, Some(Role::Owner));
        self.get_group(group.id)?
            .ok_or(RepoError::GroupNotFound(group.id))
    }

    fn get_group(&self, group_id: GroupId) -> RepoResult<Option<FamilyGroup>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([group_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_group_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_group_by_invite_code(&self, invite_code: &str) -> RepoResult<Option<FamilyGroup>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} WHERE invite_code = ?1;"))?;
        let mut rows = stmt.query([invite_code])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_group_row(row)?)),
            None => Ok(None),
        }
    }

    fn rename_group(&self, group_id: GroupId, name: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE family_groups SET name = ?2 WHERE id = ?1;",
            params![group_id.to_string(), name],
        )?;
        if changed == 0 {
            return Err(RepoError::GroupNotFound(group_id));
        }
        Ok(())
    }

    fn set_invite_code(&self, group_id: GroupId, invite_code: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE family_groups SET invite_code = ?2 WHERE id = ?1;",
            params![group_id.to_string(), invite_code],
        )?;
        if changed == 0 {
            return Err(RepoError::GroupNotFound(group_id));
        }
        Ok(())
    }

    fn add_member(&self, group_id: GroupId, user_id: &str, role: Role) -> RepoResult<Membership> {
        if self.get_group(group_id)?.is_none() {
            return Err(RepoError::GroupNotFound(group_id));
        }

        let inserted = self.conn.execute(
            "INSERT INTO memberships (group_id, user_id, role) VALUES (?1, ?2, ?3);",
            params![group_id.to_string(), user_id, role.as_str()],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(RepoError::DuplicateMembership {
                    group_id,
                    user_id: user_id.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            "event=member_add module=repo status=ok group_id={group_id} role={}",
            role.as_str()
        );
        self.publish(group_id, user_id, Some(role));
        self.require_membership(group_id, user_id)
    }

    fn set_role(&self, group_id: GroupId, user_id: &str, role: Role) -> RepoResult<Membership> {
        let changed = self.conn.execute(
            "UPDATE memberships SET role = ?3 WHERE group_id = ?1 AND user_id = ?2;",
            params![group_id.to_string(), user_id, role.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::MembershipNotFound {
                group_id,
                user_id: user_id.to_string(),
            });
        }

        info!(
            "event=role_change module=repo status=ok group_id={group_id} role={}",
            role.as_str()
        );
        self.publish(group_id, user_id, Some(role));
        self.require_membership(group_id, user_id)
    }

    fn remove_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM memberships WHERE group_id = ?1 AND user_id = ?2;",
            params![group_id.to_string(), user_id],
        )?;
        if changed == 0 {
            return Err(RepoError::MembershipNotFound {
                group_id,
                user_id: user_id.to_string(),
            });
        }

        info!("event=member_remove module=repo status=ok group_id={group_id}");
        self.publish(group_id, user_id, None);
        Ok(())
    }

    fn get_membership(&self, group_id: GroupId, user_id: &str) -> RepoResult<Option<Membership>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBERSHIP_SELECT_SQL} WHERE group_id = ?1 AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![group_id.to_string(), user_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_membership_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_members(&self, group_id: GroupId) -> RepoResult<Vec<Membership>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBERSHIP_SELECT_SQL}
             WHERE group_id = ?1
             ORDER BY CASE role WHEN 'owner' THEN 0 WHEN 'member' THEN 1 ELSE 2 END,
                      joined_at ASC,
                      user_id ASC;"
        ))?;
        let mut rows = stmt.query([group_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_membership_row(row)?);
        }
        Ok(members)
    }

    fn count_owners(&self, group_id: GroupId) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM memberships WHERE group_id = ?1 AND role = 'owner';",
            [group_id.to_string()],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }
}

/// Reads one actor's role straight from `memberships`.
///
/// Shared by the role store and by resource writes that must re-derive the
/// role on the storage side.
pub(crate) fn query_role(
    conn: &Connection,
    group_id: GroupId,
    user_id: &str,
) -> RepoResult<Option<Role>> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Ok(None);
    }

    let role_text = conn
        .query_row(
            "SELECT role FROM memberships WHERE group_id = ?1 AND user_id = ?2;",
            params![group_id.to_string(), user_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    role_text
        .map(|value| {
            parse_role(&value).map_err(|err| {
                RepoError::InvalidData(format!("{err} in memberships.role"))
            })
        })
        .transpose()
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<FamilyGroup> {
    let id_text: String = row.get("id")?;
    Ok(FamilyGroup {
        id: parse_uuid_column(&id_text, "family_groups.id")?,
        name: row.get("name")?,
        invite_code: row.get("invite_code")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_membership_row(row: &Row<'_>) -> RepoResult<Membership> {
    let group_text: String = row.get("group_id")?;
    let role_text: String = row.get("role")?;
    let role = parse_role(&role_text)
        .map_err(|err| RepoError::InvalidData(format!("{err} in memberships.role")))?;
    Ok(Membership {
        group_id: parse_uuid_column(&group_text, "memberships.group_id")?,
        user_id: row.get("user_id")?,
        role,
        joined_at: row.get("joined_at")?,
    })
}
