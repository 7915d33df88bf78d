// End-to-end scenarios through the full application stack

mod common;

use common::*;

use rbac_core::ability::PermissionGate;
use rbac_core::audit::AuditFilter;
use rbac_core::errors::{DomainError, IntegrityRule};
use rbac_core::types::entities::{Action, NewRole, RolePatch};
use rbac_core::types::internal::AuditAction;

#[test]
fn regional_manager_reads_but_cannot_delete() {
    let (app, _) = setup_app();
    let ctx = admin_context();

    let role_id = create_role(&app, "regional_manager");
    let read = create_permission(&app, Action::Read, "security-group");
    create_permission(&app, Action::Delete, "security-group");
    app.entity_store
        .set_role_permissions(&ctx, &role_id, vec![read])
        .unwrap();
    let user_id = create_user(&app, "morgan", &role_id);

    let ability = app.abilities.ability_for_user(&user_id).unwrap();
    assert!(ability.can(Action::Read, "security-group"));
    assert!(!ability.can(Action::Delete, "security-group"));
}

#[test]
fn superadmin_bypasses_all_checks() {
    let (app, _) = setup_app();
    let ctx = admin_context();

    let role = app
        .entity_store
        .create_role(
            &ctx,
            NewRole {
                is_admin: true,
                is_system: true,
                ..NewRole::named("Superadmin", "superadmin")
            },
        )
        .unwrap();
    let user_id = create_user(&app, "root", &role.id);

    let ability = app.abilities.ability_for_user(&user_id).unwrap();
    // No permissions were ever granted
    assert!(ability.can(Action::Delete, "security-group"));
    assert!(ability.can_key("anything.create"));
    assert!(PermissionGate::require_all(["a.read", "b.update"]).allows(&ability));
}

#[test]
fn role_deletion_blocked_while_referenced() {
    let (app, _) = setup_app();
    let ctx = admin_context();

    let role_id = create_role(&app, "editors");
    let user_id = create_user(&app, "alice", &role_id);

    let err = app.entity_store.delete_role(&ctx, &role_id).unwrap_err();
    match err {
        DomainError::Integrity { rule, entity_ids, .. } => {
            assert_eq!(rule, IntegrityRule::RoleInUse);
            assert_eq!(entity_ids, vec![user_id.clone()]);
        }
        other => panic!("expected integrity error, got {other:?}"),
    }

    // After the user moves to another role, the deletion goes through
    app.entity_store.delete_user(&ctx, &user_id).unwrap();
    app.entity_store.delete_role(&ctx, &role_id).unwrap();
}

#[test]
fn module_permission_lifecycle() {
    let (app, _) = setup_app();
    let ctx = admin_context();

    let created = app
        .entity_store
        .create_module_permissions(&ctx, "widgets")
        .unwrap();
    assert_eq!(created.len(), 4);

    // Assign one of them; the module can no longer be deleted
    let role_id = create_role(&app, "editors");
    app.entity_store
        .set_role_permissions(&ctx, &role_id, vec![created[0].id.clone()])
        .unwrap();
    let err = app
        .entity_store
        .delete_module_permissions(&ctx, "widgets")
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::Integrity {
            rule: IntegrityRule::PermissionAssigned,
            ..
        }
    ));

    // Unassign, then the whole module goes away at once
    app.entity_store
        .set_role_permissions(&ctx, &role_id, vec![])
        .unwrap();
    let removed = app
        .entity_store
        .delete_module_permissions(&ctx, "widgets")
        .unwrap();
    assert_eq!(removed, 4);
    assert!(app.entity_store.permissions_for_subject("widgets").is_empty());
}

#[test]
fn ability_cache_follows_permission_changes() {
    let (app, _) = setup_app();
    let ctx = admin_context();

    let role_id = create_role(&app, "editors");
    let user_id = create_user(&app, "alice", &role_id);
    let read = create_permission(&app, Action::Read, "widgets");

    let ability = app.abilities.ability_for_user(&user_id).unwrap();
    assert!(!ability.can(Action::Read, "widgets"));

    app.entity_store
        .set_role_permissions(&ctx, &role_id, vec![read])
        .unwrap();
    let ability = app.abilities.ability_for_user(&user_id).unwrap();
    assert!(ability.can(Action::Read, "widgets"));

    // Deactivating the role revokes everything on the next check
    app.entity_store
        .update_role(
            &ctx,
            &role_id,
            RolePatch {
                is_active: Some(false),
                ..RolePatch::default()
            },
        )
        .unwrap();
    let ability = app.abilities.ability_for_user(&user_id).unwrap();
    assert!(!ability.can(Action::Read, "widgets"));
}

#[test]
fn every_committed_mutation_is_audited() {
    let (app, _) = setup_app();
    let ctx = admin_context();

    let role_id = create_role(&app, "editors");
    let perm = create_permission(&app, Action::Read, "widgets");
    let user_id = create_user(&app, "alice", &role_id);
    app.entity_store
        .set_role_permissions(&ctx, &role_id, vec![perm])
        .unwrap();
    app.entity_store.record_login(&ctx, &user_id).unwrap();
    app.entity_store.delete_user(&ctx, &user_id).unwrap();

    let counts = app.audit.counts_by_action(&AuditFilter::all());
    assert_eq!(counts.get("create"), Some(&3));
    assert_eq!(counts.get("role_change"), Some(&1));
    assert_eq!(counts.get("login"), Some(&1));
    assert_eq!(counts.get("delete"), Some(&1));
    assert_eq!(app.audit.len(), 6);

    // A rejected mutation leaves no trace
    let err = app
        .entity_store
        .delete_role(&ctx, "no-such-role")
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
    assert_eq!(app.audit.len(), 6);
}

#[test]
fn flush_failure_rolls_back_and_audits_nothing() {
    let (app, adapter) = setup_app();
    let ctx = admin_context();
    let role_id = create_role(&app, "editors");
    let audit_before = app.audit.len();

    adapter.set_fail_saves(true);
    let err = app
        .entity_store
        .update_role(
            &ctx,
            &role_id,
            RolePatch {
                name: Some("Renamed".to_string()),
                ..RolePatch::default()
            },
        )
        .unwrap_err();
    adapter.set_fail_saves(false);

    assert!(matches!(err, DomainError::Persistence { .. }));
    let role = app.entity_store.get_role(&role_id).unwrap();
    assert_eq!(role.key, "editors");
    assert_eq!(role.name, "editors");
    assert_eq!(app.audit.len(), audit_before);
}

#[test]
fn csv_export_covers_the_filtered_window() {
    let (app, _) = setup_app();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.csv");

    create_role(&app, "editors");
    create_permission(&app, Action::Read, "widgets");

    let count = app
        .audit
        .export_to_file(&path, &AuditFilter::last_days(1))
        .unwrap();
    assert_eq!(count, 2);

    let csv = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("id,timestamp,actor_id"));
    assert!(csv.contains("editors"));
    assert!(csv.contains(AuditAction::Create.as_str()));
}

#[test]
fn permission_gates_over_a_real_role() {
    let (app, _) = setup_app();
    let ctx = admin_context();

    let role_id = create_role(&app, "support");
    let read_users = create_permission(&app, Action::Read, "users");
    let read_audit = create_permission(&app, Action::Read, "audit");
    app.entity_store
        .set_role_permissions(&ctx, &role_id, vec![read_users, read_audit])
        .unwrap();

    let ability = app.abilities.ability_for_role(&role_id).unwrap();
    assert!(PermissionGate::require_all(["users.read", "audit.read"]).allows(&ability));
    assert!(!PermissionGate::require_all(["users.read", "users.delete"]).allows(&ability));
    assert!(PermissionGate::require_any(["users.delete", "audit.read"]).allows(&ability));
    let err = PermissionGate::require_all(["users.delete"])
        .check(&ability)
        .unwrap_err();
    assert!(err.to_string().contains("users.delete"));
}
