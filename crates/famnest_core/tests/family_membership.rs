use famnest_core::db::open_db_in_memory;
use famnest_core::{
    DenyReason, FamilyRepository, FamilyService, FamilyServiceError, Role, RoleChangeFeed,
    RoleStore, SqliteFamilyRepository,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn service(conn: &Connection) -> FamilyService<SqliteFamilyRepository<'_>> {
    let repo = SqliteFamilyRepository::try_new(conn, Arc::new(RoleChangeFeed::new())).unwrap();
    FamilyService::new(repo)
}

#[test]
fn creator_becomes_owner_and_invitee_joins_as_member() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let group = service.create_family("alice", "  The Smiths ").unwrap();
    assert_eq!(group.name, "The Smiths");
    assert_eq!(group.created_by, "alice");
    assert_eq!(group.invite_code.len(), 8);

    let membership = service
        .join_with_invite_code("bob", &group.invite_code.to_lowercase())
        .unwrap();
    assert_eq!(membership.role, Role::Member);

    let repo = service.repo();
    assert_eq!(repo.resolve_role(group.id, "alice").unwrap(), Some(Role::Owner));
    assert_eq!(repo.resolve_role(group.id, "bob").unwrap(), Some(Role::Member));
}

#[test]
fn resolve_role_returns_none_for_non_members_and_blank_ids() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let group = service.create_family("alice", "Home").unwrap();

    let repo = service.repo();
    assert_eq!(repo.resolve_role(group.id, "mallory").unwrap(), None);
    assert_eq!(repo.resolve_role(group.id, "   ").unwrap(), None);
    assert_eq!(repo.resolve_role(Uuid::new_v4(), "alice").unwrap(), None);
}

#[test]
fn joining_twice_or_with_unknown_code_fails() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let group = service.create_family("alice", "Home").unwrap();

    service.join_with_invite_code("bob", &group.invite_code).unwrap();
    let err = service
        .join_with_invite_code("bob", &group.invite_code)
        .unwrap_err();
    assert!(matches!(err, FamilyServiceError::AlreadyMember(id) if id == group.id));

    let unknown = if group.invite_code == "ZZZZ9999" { "ZZZZ9998" } else { "ZZZZ9999" };
    let err = service.join_with_invite_code("carol", unknown).unwrap_err();
    assert!(matches!(err, FamilyServiceError::InviteCodeNotFound));

    let err = service.join_with_invite_code("carol", "nope").unwrap_err();
    assert!(matches!(err, FamilyServiceError::InvalidInviteCode(_)));
}

#[test]
fn only_owner_can_change_roles() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let group = service.create_family("alice", "Home").unwrap();
    service.join_with_invite_code("bob", &group.invite_code).unwrap();
    service.join_with_invite_code("carol", &group.invite_code).unwrap();

    let err = service
        .change_role("bob", group.id, "carol", Role::Viewer)
        .unwrap_err();
    assert!(matches!(
        err,
        FamilyServiceError::Denied(DenyReason::InsufficientRole { .. })
    ));

    let updated = service
        .change_role("alice", group.id, "carol", Role::Viewer)
        .unwrap();
    assert_eq!(updated.role, Role::Viewer);

    let err = service
        .change_role("mallory", group.id, "carol", Role::Owner)
        .unwrap_err();
    assert!(matches!(
        err,
        FamilyServiceError::Denied(DenyReason::Unauthenticated)
    ));
}

#[test]
fn role_change_overwrites_single_membership_row() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let group = service.create_family("alice", "Home").unwrap();
    service.join_with_invite_code("bob", &group.invite_code).unwrap();

    service.change_role("alice", group.id, "bob", Role::Owner).unwrap();
    service.change_role("alice", group.id, "bob", Role::Viewer).unwrap();

    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM memberships WHERE group_id = ?1 AND user_id = 'bob';",
            [group.id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(
        service.repo().resolve_role(group.id, "bob").unwrap(),
        Some(Role::Viewer)
    );
}

#[test]
fn last_owner_cannot_be_demoted_removed_or_leave() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let group = service.create_family("alice", "Home").unwrap();

    let err = service
        .change_role("alice", group.id, "alice", Role::Member)
        .unwrap_err();
    assert!(matches!(err, FamilyServiceError::LastOwner(_)));

    let err = service.remove_member("alice", group.id, "alice").unwrap_err();
    assert!(matches!(err, FamilyServiceError::LastOwner(_)));

    let err = service.leave_family("alice", group.id).unwrap_err();
    assert!(matches!(err, FamilyServiceError::LastOwner(_)));

    service.join_with_invite_code("bob", &group.invite_code).unwrap();
    service.change_role("alice", group.id, "bob", Role::Owner).unwrap();
    service.leave_family("alice", group.id).unwrap();
    assert_eq!(service.repo().resolve_role(group.id, "alice").unwrap(), None);
    assert_eq!(service.repo().count_owners(group.id).unwrap(), 1);
}

#[test]
fn governance_actions_are_owner_only() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let group = service.create_family("alice", "Home").unwrap();
    service.join_with_invite_code("bob", &group.invite_code).unwrap();
    service.join_with_invite_code("carol", &group.invite_code).unwrap();

    assert!(matches!(
        service.remove_member("bob", group.id, "carol"),
        Err(FamilyServiceError::Denied(_))
    ));
    assert!(matches!(
        service.regenerate_invite_code("bob", group.id),
        Err(FamilyServiceError::Denied(_))
    ));
    assert!(matches!(
        service.rename_family("bob", group.id, "Bob's"),
        Err(FamilyServiceError::Denied(_))
    ));

    let renamed = service.rename_family("alice", group.id, "Smith Family").unwrap();
    assert_eq!(renamed.name, "Smith Family");

    let new_code = service.regenerate_invite_code("alice", group.id).unwrap();
    assert_ne!(new_code, group.invite_code);
    let err = service
        .join_with_invite_code("dave", &group.invite_code)
        .unwrap_err();
    assert!(matches!(err, FamilyServiceError::InviteCodeNotFound));

    service.remove_member("alice", group.id, "carol").unwrap();
    assert_eq!(service.repo().resolve_role(group.id, "carol").unwrap(), None);
}

#[test]
fn governance_on_unknown_group_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let missing = Uuid::new_v4();

    let err = service.rename_family("alice", missing, "x").unwrap_err();
    assert!(matches!(err, FamilyServiceError::GroupNotFound(id) if id == missing));
}

#[test]
fn list_members_requires_membership_and_orders_owners_first() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let group = service.create_family("alice", "Home").unwrap();
    service.join_with_invite_code("bob", &group.invite_code).unwrap();
    service.change_role("alice", group.id, "bob", Role::Viewer).unwrap();

    let members = service.list_members("bob", group.id).unwrap();
    let summary: Vec<_> = members
        .iter()
        .map(|m| (m.user_id.as_str(), m.role))
        .collect();
    assert_eq!(summary, vec![("alice", Role::Owner), ("bob", Role::Viewer)]);

    let err = service.list_members("mallory", group.id).unwrap_err();
    assert!(matches!(
        err,
        FamilyServiceError::Denied(DenyReason::Unauthenticated)
    ));
}

#[test]
fn membership_writes_publish_role_changes() {
    let conn = open_db_in_memory().unwrap();
    let feed = Arc::new(RoleChangeFeed::new());
    let repo = SqliteFamilyRepository::try_new(&conn, Arc::clone(&feed)).unwrap();
    let service = FamilyService::new(repo);
    let group = service.create_family("alice", "Home").unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = service.repo().subscribe_to_role_changes(
        group.id,
        "bob",
        Arc::new(move |role| sink.lock().unwrap().push(role)),
    );

    service.join_with_invite_code("bob", &group.invite_code).unwrap();
    service.change_role("alice", group.id, "bob", Role::Viewer).unwrap();
    service.remove_member("alice", group.id, "bob").unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(Role::Member), Some(Role::Viewer), None]
    );

    assert!(service.repo().unsubscribe(subscription));
    assert_eq!(feed.subscriber_count(), 0);
}
