use super::domain::{DomainError, IntegrityRule};

#[test]
fn not_found_names_entity_and_id() {
    let err = DomainError::not_found("role", "role-007");
    assert_eq!(err.to_string(), "role not found: role-007");
}

#[test]
fn duplicate_names_field_and_value() {
    let err = DomainError::duplicate("user", "username", "jdoe");
    assert_eq!(err.to_string(), "Duplicate user: username 'jdoe' already exists");
}

#[test]
fn integrity_error_carries_rule_and_offenders() {
    let err = DomainError::integrity(
        IntegrityRule::RoleInUse,
        "role is referenced by 2 users",
        vec!["user-1".to_string(), "user-2".to_string()],
    );
    assert!(err.to_string().contains("role_in_use"));
    match err {
        DomainError::Integrity { rule, entity_ids, .. } => {
            assert_eq!(rule, IntegrityRule::RoleInUse);
            assert_eq!(entity_ids.len(), 2);
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn immutable_field_message_names_the_field() {
    let err = DomainError::immutable_field("role", "key", "role-001");
    assert_eq!(err.to_string(), "Field 'key' on role 'role-001' is immutable");
}

#[test]
fn rule_display_matches_as_str() {
    for rule in [
        IntegrityRule::UserRoleExists,
        IntegrityRule::UniqueAssignment,
        IntegrityRule::PermissionAssigned,
        IntegrityRule::SystemRoleProtected,
    ] {
        assert_eq!(rule.to_string(), rule.as_str());
    }
}
