use famnest_core::{
    decision_table, Action, DenyReason, Ownership, PermissionDecision, PermissionEngine,
    ResourceAttributes, Role, Visibility,
};

const GOVERNANCE: [Action; 5] = [
    Action::ChangeEditMode,
    Action::ManageMembers,
    Action::ManageFamilySettings,
    Action::InviteMembers,
    Action::ChangeRoles,
];

fn all_resources() -> Vec<ResourceAttributes> {
    let mut resources = Vec::new();
    for created_by in [Some("u1"), Some("u2"), None] {
        for visibility in Visibility::ALL {
            resources.push(ResourceAttributes::new(created_by, visibility));
        }
    }
    resources
}

fn all_engines() -> Vec<PermissionEngine> {
    let mut engines = vec![
        PermissionEngine::unauthenticated(),
        PermissionEngine::new(None, Some("u1".to_string())),
    ];
    for role in Role::ALL {
        engines.push(PermissionEngine::for_actor(role, "u1"));
        engines.push(PermissionEngine::new(Some(role), None));
    }
    engines
}

fn governance(engine: &PermissionEngine) -> [bool; 5] {
    [
        engine.can_change_edit_mode(),
        engine.can_manage_members(),
        engine.can_manage_family_settings(),
        engine.can_invite_members(),
        engine.can_change_roles(),
    ]
}

#[test]
fn can_create_iff_owner_or_member() {
    for engine in all_engines() {
        let expected = matches!(engine.role(), Some(Role::Owner | Role::Member));
        assert_eq!(engine.can_create(), expected, "{engine:?}");
    }
}

#[test]
fn null_role_denies_everything() {
    for actor_id in [None, Some("u1".to_string())] {
        let engine = PermissionEngine::new(None, actor_id);
        assert!(!engine.can_create());
        assert_eq!(governance(&engine), [false; 5]);
        assert!(!engine.is_owner() && !engine.is_member() && !engine.is_viewer());
        for resource in all_resources() {
            assert_eq!(
                engine.can_modify(&resource),
                PermissionDecision::Denied(DenyReason::Unauthenticated)
            );
            assert_eq!(
                engine.can_delete(&resource),
                PermissionDecision::Denied(DenyReason::Unauthenticated)
            );
        }
    }
}

#[test]
fn decisions_are_deterministic() {
    for engine in all_engines() {
        for resource in all_resources() {
            assert_eq!(engine.can_modify(&resource), engine.can_modify(&resource));
            assert_eq!(engine.can_delete(&resource), engine.can_delete(&resource));
        }
        assert_eq!(governance(&engine), governance(&engine));
    }
    assert_eq!(decision_table(), decision_table());
}

#[test]
fn owner_supremacy() {
    let engine = PermissionEngine::for_actor(Role::Owner, "u1");
    for resource in all_resources() {
        assert!(engine.can_modify(&resource).is_allowed());
        assert!(engine.can_delete(&resource).is_allowed());
    }
    assert_eq!(governance(&engine), [true; 5]);
}

#[test]
fn viewer_containment() {
    let engine = PermissionEngine::for_actor(Role::Viewer, "u1");
    assert!(!engine.can_create());
    assert_eq!(governance(&engine), [false; 5]);
    for resource in all_resources() {
        assert!(!engine.can_modify(&resource).is_allowed());
        assert!(!engine.can_delete(&resource).is_allowed());
    }
}

#[test]
fn member_asymmetry_between_modify_and_delete() {
    let engine = PermissionEngine::for_actor(Role::Member, "u1");
    let foreign_public = ResourceAttributes::new(Some("u2"), Visibility::Public);
    assert!(engine.can_modify(&foreign_public).is_allowed());
    assert_eq!(
        engine.can_delete(&foreign_public),
        PermissionDecision::Denied(DenyReason::OwnershipMismatch)
    );
}

#[test]
fn member_self_ownership_overrides_visibility() {
    let engine = PermissionEngine::for_actor(Role::Member, "u1");
    for visibility in Visibility::ALL {
        let own = ResourceAttributes::new(Some("u1"), visibility);
        assert!(engine.can_modify(&own).is_allowed());
        assert!(engine.can_delete(&own).is_allowed());
    }
}

#[test]
fn member_exclusion_from_foreign_private_resources() {
    let engine = PermissionEngine::for_actor(Role::Member, "u1");
    let foreign_private = ResourceAttributes::new(Some("u2"), Visibility::Private);
    assert!(!engine.can_modify(&foreign_private).is_allowed());
    assert!(!engine.can_delete(&foreign_private).is_allowed());
}

#[test]
fn governance_predicates_match_owner_only_table_rows() {
    for row in decision_table()
        .into_iter()
        .filter(|row| GOVERNANCE.contains(&row.action))
    {
        assert_eq!(row.decision.is_allowed(), row.role == Some(Role::Owner), "{row}");
    }
}

#[test]
fn table_member_rows_follow_ownership_and_visibility() {
    for row in decision_table()
        .into_iter()
        .filter(|row| row.role == Some(Role::Member) && row.action.needs_resource())
    {
        let expected = match (row.action, row.ownership, row.visibility) {
            (_, Some(Ownership::Creator), _) => true,
            (Action::Modify, _, Some(Visibility::Public)) => true,
            _ => false,
        };
        assert_eq!(row.decision.is_allowed(), expected, "{row}");
    }
}

#[test]
fn scenario_a_owner_on_foreign_private_resource() {
    let engine = PermissionEngine::for_actor(Role::Owner, "u1");
    let resource = ResourceAttributes::new(Some("u2"), Visibility::Private);
    assert_eq!(engine.can_modify(&resource), PermissionDecision::Allowed);
    assert_eq!(engine.can_delete(&resource), PermissionDecision::Allowed);
}

#[test]
fn scenario_b_member_on_foreign_public_resource() {
    let engine = PermissionEngine::for_actor(Role::Member, "u1");
    let resource = ResourceAttributes::new(Some("u2"), Visibility::Public);
    assert_eq!(engine.can_modify(&resource), PermissionDecision::Allowed);
    let delete = engine.can_delete(&resource);
    assert!(!delete.is_allowed());
    assert_eq!(delete.reason(), Some("you can only delete resources you created"));
}

#[test]
fn scenario_c_member_on_foreign_private_resource() {
    let engine = PermissionEngine::for_actor(Role::Member, "u1");
    let resource = ResourceAttributes::new(Some("u2"), Visibility::Private);
    let modify = engine.can_modify(&resource);
    assert!(!modify.is_allowed());
    assert_eq!(
        modify.reason(),
        Some("resource is private; only the owner may modify it")
    );
}

#[test]
fn scenario_d_viewer() {
    let engine = PermissionEngine::for_actor(Role::Viewer, "u1");
    for resource in all_resources() {
        assert!(!engine.can_modify(&resource).is_allowed());
    }
    assert!(!engine.can_create());
    assert!(!engine.can_manage_members());
    assert!(engine.is_viewer());
}

#[test]
fn scenario_e_unauthenticated() {
    let engine = PermissionEngine::new(None, None);
    assert!(!engine.can_create());
    assert_eq!(governance(&engine), [false; 5]);
    for resource in all_resources() {
        assert_eq!(engine.can_modify(&resource).reason(), Some("not authenticated"));
        assert_eq!(engine.can_delete(&resource).reason(), Some("not authenticated"));
    }
}

#[test]
fn scenario_f_member_on_own_private_resource() {
    let engine = PermissionEngine::for_actor(Role::Member, "u1");
    let resource = ResourceAttributes::new(Some("u1"), Visibility::Private);
    assert_eq!(engine.can_modify(&resource), PermissionDecision::Allowed);
    assert_eq!(engine.can_delete(&resource), PermissionDecision::Allowed);
}

#[test]
fn role_and_visibility_serialize_as_lowercase_labels() {
    assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
    assert_eq!(serde_json::to_string(&Visibility::Private).unwrap(), "\"private\"");
    let role: Role = serde_json::from_str("\"viewer\"").unwrap();
    assert_eq!(role, Role::Viewer);
    assert!(serde_json::from_str::<Role>("\"admin\"").is_err());
}
