//! FFI use-case API for UI-facing calls.
//!
//! # Responsibility
//! - Expose permission checks and family/resource use-cases to Dart via FRB.
//! - Flatten core errors into message strings for simple UI handling.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Permission denials are ordinary responses (`allowed=false` / `ok=false`)
//!   carrying a user-facing reason.

use famnest_core::db::open_db;
use famnest_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, parse_role,
    ping as ping_inner, Action, FamilyService, NewResource, ResourceAttributes,
    ResourceKind, ResourceService, RoleChangeFeed, RoleStore, SqliteFamilyRepository,
    SqliteResourceRepository, Visibility,
};
use famnest_core::{PermissionEngine, Resource};
use log::warn;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

const DB_FILE_NAME: &str = "famnest.sqlite3";
const DB_PATH_ENV: &str = "FAMNEST_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Decision envelope for UI gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCheckResponse {
    pub allowed: bool,
    /// User-facing denial reason; `None` when allowed or input was invalid.
    pub reason: Option<String>,
    /// Diagnostics for invalid input; empty otherwise.
    pub message: String,
}

/// Family use-case result envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyActionResponse {
    pub ok: bool,
    pub group_id: Option<String>,
    pub invite_code: Option<String>,
    /// Role after the action (`owner|member|viewer`), when relevant.
    pub role: Option<String>,
    pub message: String,
}

impl FamilyActionResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            group_id: None,
            invite_code: None,
            role: None,
            message: message.into(),
        }
    }
}

/// Resource use-case result envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceActionResponse {
    pub ok: bool,
    pub resource_id: Option<String>,
    pub message: String,
}

impl ResourceActionResponse {
    fn success(message: impl Into<String>, resource_id: String) -> Self {
        Self {
            ok: true,
            resource_id: Some(resource_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            resource_id: None,
            message: message.into(),
        }
    }
}

/// Evaluates one permission check without touching storage.
///
/// Input semantics:
/// - `role`: `owner|member|viewer`, or `None` for unauthenticated/non-member.
/// - `action`: `create|modify|delete|change_edit_mode|manage_members|
///   manage_family_settings|invite_members|change_roles`.
/// - `created_by`/`visibility`: resource attributes; read only for
///   `modify`/`delete`. Missing visibility means `public`.
///
/// # FFI contract
/// - Sync, pure, never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn permission_check(
    role: Option<String>,
    actor_id: Option<String>,
    action: String,
    created_by: Option<String>,
    visibility: Option<String>,
) -> PermissionCheckResponse {
    let invalid = |message: String| PermissionCheckResponse {
        allowed: false,
        reason: None,
        message,
    };

    let role = match role.as_deref().map(parse_role).transpose() {
        Ok(role) => role,
        Err(err) => return invalid(err.to_string()),
    };
    let Some(action) = Action::parse(&action) else {
        return invalid(format!("unsupported action `{action}`"));
    };
    let visibility = match visibility.as_deref() {
        None => Visibility::default(),
        Some(value) => match Visibility::parse(value) {
            Some(visibility) => visibility,
            None => return invalid(format!("unsupported visibility `{value}`")),
        },
    };

    let engine = PermissionEngine::new(role, actor_id);
    let resource = ResourceAttributes::new(created_by.as_deref(), visibility);
    let decision = engine.evaluate(action, Some(&resource as &dyn Resource));
    PermissionCheckResponse {
        allowed: decision.is_allowed(),
        reason: decision.reason().map(str::to_string),
        message: String::new(),
    }
}

/// Creates a family group owned by `creator_id`.
///
/// # FFI contract
/// - Sync call, DB-backed execution. Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn family_create(creator_id: String, name: String) -> FamilyActionResponse {
    let result = with_connection(|conn| {
        let service = family_service(conn)?;
        service
            .create_family(&creator_id, &name)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(group) => FamilyActionResponse {
            ok: true,
            group_id: Some(group.id.to_string()),
            invite_code: Some(group.invite_code),
            role: Some("owner".to_string()),
            message: "Family created.".to_string(),
        },
        Err(err) => FamilyActionResponse::failure(format!("family_create failed: {err}")),
    }
}

/// Joins a family through its invite code with role `member`.
#[flutter_rust_bridge::frb(sync)]
pub fn family_join(user_id: String, invite_code: String) -> FamilyActionResponse {
    let result = with_connection(|conn| {
        let service = family_service(conn)?;
        service
            .join_with_invite_code(&user_id, &invite_code)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(membership) => FamilyActionResponse {
            ok: true,
            group_id: Some(membership.group_id.to_string()),
            invite_code: None,
            role: Some(membership.role.as_str().to_string()),
            message: "Joined family.".to_string(),
        },
        Err(err) => FamilyActionResponse::failure(format!("family_join failed: {err}")),
    }
}

/// Resolves the stored role of `user_id` in `group_id`.
///
/// `ok=true` with `role=None` means "not a member".
#[flutter_rust_bridge::frb(sync)]
pub fn family_resolve_role(group_id: String, user_id: String) -> FamilyActionResponse {
    let result = with_connection(|conn| {
        let group = parse_id(&group_id, "group_id")?;
        let repo = family_repo(conn)?;
        repo.resolve_role(group, &user_id)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(role) => FamilyActionResponse {
            ok: true,
            group_id: Some(group_id),
            invite_code: None,
            role: role.map(|role| role.as_str().to_string()),
            message: String::new(),
        },
        Err(err) => FamilyActionResponse::failure(format!("family_resolve_role failed: {err}")),
    }
}

/// Creates a resource on behalf of `actor_id` using their stored role.
#[flutter_rust_bridge::frb(sync)]
pub fn resource_create(
    actor_id: String,
    group_id: String,
    kind: String,
    title: String,
    body: String,
) -> ResourceActionResponse {
    let result = with_connection(|conn| {
        let group_id = parse_id(&group_id, "group_id")?;
        let kind = ResourceKind::parse(&kind).ok_or_else(|| format!("unsupported kind `{kind}`"))?;
        let engine = family_service(conn)?
            .engine_for(group_id, &actor_id)
            .map_err(|err| err.to_string())?;
        resource_service(conn)?
            .create(
                &engine,
                &NewResource {
                    group_id,
                    kind,
                    title,
                    body,
                },
            )
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(record) => ResourceActionResponse::success("Resource created.", record.id.to_string()),
        Err(err) => ResourceActionResponse::failure(format!("resource_create failed: {err}")),
    }
}

/// Deletes a resource on behalf of `actor_id` using their stored role.
#[flutter_rust_bridge::frb(sync)]
pub fn resource_delete(actor_id: String, resource_id: String) -> ResourceActionResponse {
    let result = with_connection(|conn| {
        let id = parse_id(&resource_id, "resource_id")?;
        let service = resource_service(conn)?;
        let record = service
            .get(id)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("resource not found: {id}"))?;
        let engine = family_service(conn)?
            .engine_for(record.group_id, &actor_id)
            .map_err(|err| err.to_string())?;
        service.delete(&engine, id).map_err(|err| err.to_string())
    });
    match result {
        Ok(()) => ResourceActionResponse::success("Resource deleted.", resource_id),
        Err(err) => ResourceActionResponse::failure(format!("resource_delete failed: {err}")),
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn with_connection<T>(f: impl FnOnce(&Connection) -> Result<T, String>) -> Result<T, String> {
    let conn = open_db(resolve_db_path()).map_err(|err| {
        warn!("event=ffi_db_open module=ffi status=error error={err}");
        format!("DB open failed: {err}")
    })?;
    f(&conn)
}

fn family_repo(conn: &Connection) -> Result<SqliteFamilyRepository<'_>, String> {
    // Each call owns a short-lived connection; nobody outlives it to subscribe.
    SqliteFamilyRepository::try_new(conn, Arc::new(RoleChangeFeed::new()))
        .map_err(|err| format!("family repo init failed: {err}"))
}

fn family_service(conn: &Connection) -> Result<FamilyService<SqliteFamilyRepository<'_>>, String> {
    family_repo(conn).map(FamilyService::new)
}

fn resource_service(
    conn: &Connection,
) -> Result<ResourceService<SqliteResourceRepository<'_>>, String> {
    SqliteResourceRepository::try_new(conn)
        .map(ResourceService::new)
        .map_err(|err| format!("resource repo init failed: {err}"))
}

fn parse_id(value: &str, field: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value.trim()).map_err(|_| format!("invalid {field} `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, family_create, family_join, family_resolve_role, init_logging,
        permission_check, ping, resource_create, resource_delete,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn permission_check_reports_member_delete_asymmetry() {
        let modify = permission_check(
            Some("member".to_string()),
            Some("u1".to_string()),
            "modify".to_string(),
            Some("u2".to_string()),
            Some("public".to_string()),
        );
        assert!(modify.allowed);
        assert_eq!(modify.reason, None);

        let delete = permission_check(
            Some("member".to_string()),
            Some("u1".to_string()),
            "delete".to_string(),
            Some("u2".to_string()),
            Some("public".to_string()),
        );
        assert!(!delete.allowed);
        assert_eq!(
            delete.reason.as_deref(),
            Some("you can only delete resources you created")
        );
    }

    #[test]
    fn permission_check_denies_unauthenticated() {
        let response = permission_check(None, None, "create".to_string(), None, None);
        assert!(!response.allowed);
        assert_eq!(response.reason.as_deref(), Some("not authenticated"));
    }

    #[test]
    fn permission_check_rejects_unknown_inputs() {
        let bad_role = permission_check(
            Some("admin".to_string()),
            Some("u1".to_string()),
            "create".to_string(),
            None,
            None,
        );
        assert!(!bad_role.allowed);
        assert!(bad_role.message.contains("admin"));

        let bad_action = permission_check(
            Some("owner".to_string()),
            Some("u1".to_string()),
            "read".to_string(),
            None,
            None,
        );
        assert!(!bad_action.allowed);
        assert!(bad_action.message.contains("read"));
    }

    #[test]
    fn family_flow_grants_owner_and_member_roles() {
        let owner = unique_token("owner");
        let member = unique_token("member");

        let created = family_create(owner.clone(), "Home".to_string());
        assert!(created.ok, "{}", created.message);
        let group_id = created.group_id.expect("group id");
        let code = created.invite_code.expect("invite code");

        let joined = family_join(member.clone(), code);
        assert!(joined.ok, "{}", joined.message);
        assert_eq!(joined.role.as_deref(), Some("member"));

        let resolved = family_resolve_role(group_id.clone(), owner);
        assert_eq!(resolved.role.as_deref(), Some("owner"));
        let stranger = family_resolve_role(group_id, unique_token("stranger"));
        assert!(stranger.ok);
        assert_eq!(stranger.role, None);
    }

    #[test]
    fn resource_delete_is_gated_by_stored_role() {
        let owner = unique_token("owner");
        let member = unique_token("member");
        let created = family_create(owner.clone(), "Home".to_string());
        let group_id = created.group_id.expect("group id");
        let joined = family_join(member.clone(), created.invite_code.expect("invite code"));
        assert!(joined.ok, "{}", joined.message);

        let note = resource_create(
            owner.clone(),
            group_id,
            "note".to_string(),
            "Chores".to_string(),
            String::new(),
        );
        assert!(note.ok, "{}", note.message);
        let note_id = note.resource_id.expect("resource id");

        let denied = resource_delete(member, note_id.clone());
        assert!(!denied.ok);
        assert!(denied
            .message
            .contains("you can only delete resources you created"));

        let deleted = resource_delete(owner, note_id);
        assert!(deleted.ok, "{}", deleted.message);
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
