//! Pure referential-integrity validation consulted before every commit.
//!
//! The enforcer holds no mutable state of its own; it only reads a snapshot
//! of the current collections. The one exception is the legacy role-id alias
//! table: a migration compatibility shim mapping old-style role ids to their
//! current ids, consulted whenever a stored `role_id` is resolved.

use std::collections::{HashMap, HashSet};

use crate::errors::{DomainError, IntegrityRule};
use crate::stores::entity_store::StoreState;
use crate::types::entities::{
    is_valid_role_key, NewPermission, NewRole, NewUser, Permission, PermissionPatch, Role,
    RolePatch, UserPatch,
};

/// Validates mutations against the referential rules of the data model
#[derive(Debug, Default)]
pub struct IntegrityEnforcer {
    role_aliases: HashMap<String, String>,
}

impl IntegrityEnforcer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a legacy role id that should resolve to a current one
    ///
    /// Compatibility shim for data migrated from the old id scheme, not a
    /// permanent design feature; remove once no stored user carries a legacy
    /// id.
    pub fn with_role_alias(
        mut self,
        legacy_id: impl Into<String>,
        current_id: impl Into<String>,
    ) -> Self {
        self.role_aliases.insert(legacy_id.into(), current_id.into());
        self
    }

    /// Resolve a possibly-legacy role id to its current id
    pub fn resolve_role_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.role_aliases.get(id).map_or(id, String::as_str)
    }

    fn role_exists(&self, state: &StoreState, role_id: &str) -> bool {
        let resolved = self.resolve_role_id(role_id);
        state.roles.iter().any(|r| r.id == resolved)
    }

    pub(crate) fn validate_new_user(
        &self,
        state: &StoreState,
        new: &NewUser,
    ) -> Result<(), DomainError> {
        if new.username.trim().is_empty() {
            return Err(DomainError::validation("username must not be empty"));
        }
        if new.email.trim().is_empty() {
            return Err(DomainError::validation("email must not be empty"));
        }
        if state.users.iter().any(|u| u.username == new.username) {
            return Err(DomainError::duplicate("user", "username", &new.username));
        }
        if !self.role_exists(state, &new.role_id) {
            return Err(DomainError::validation(format!(
                "role_id '{}' does not reference an existing role",
                new.role_id
            )));
        }
        Ok(())
    }

    pub(crate) fn validate_user_patch(
        &self,
        state: &StoreState,
        patch: &UserPatch,
    ) -> Result<(), DomainError> {
        if let Some(email) = &patch.email {
            if email.trim().is_empty() {
                return Err(DomainError::validation("email must not be empty"));
            }
        }
        if let Some(role_id) = &patch.role_id {
            if !self.role_exists(state, role_id) {
                return Err(DomainError::validation(format!(
                    "role_id '{role_id}' does not reference an existing role"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn validate_new_role(
        &self,
        state: &StoreState,
        new: &NewRole,
    ) -> Result<(), DomainError> {
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("role name must not be empty"));
        }
        if !is_valid_role_key(&new.key) {
            return Err(DomainError::validation(format!(
                "role key '{}' must be lowercase letters, digits or underscores",
                new.key
            )));
        }
        if state.roles.iter().any(|r| r.key == new.key) {
            return Err(DomainError::duplicate("role", "key", &new.key));
        }
        Ok(())
    }

    pub(crate) fn validate_role_patch(
        &self,
        state: &StoreState,
        role: &Role,
        patch: &RolePatch,
    ) -> Result<(), DomainError> {
        if role.is_system {
            if patch.key.as_deref().is_some_and(|k| k != role.key) {
                return Err(DomainError::immutable_field("role", "key", &role.id));
            }
            if patch.is_system.is_some_and(|v| v != role.is_system) {
                return Err(DomainError::immutable_field("role", "is_system", &role.id));
            }
        }
        if let Some(key) = &patch.key {
            if !is_valid_role_key(key) {
                return Err(DomainError::validation(format!(
                    "role key '{key}' must be lowercase letters, digits or underscores"
                )));
            }
            if state.roles.iter().any(|r| r.key == *key && r.id != role.id) {
                return Err(DomainError::duplicate("role", "key", key));
            }
        }
        Ok(())
    }

    /// Rule 4 and rule 6: a role in use, or a system role, cannot be deleted
    ///
    /// "In use" resolves each user's stored `role_id` through the alias
    /// table, so users still carrying a legacy id keep their role alive.
    pub(crate) fn check_role_delete(
        &self,
        state: &StoreState,
        role: &Role,
    ) -> Result<(), DomainError> {
        if role.is_system {
            return Err(DomainError::integrity(
                IntegrityRule::SystemRoleProtected,
                format!("system role '{}' cannot be deleted", role.key),
                vec![role.id.clone()],
            ));
        }
        let holders: Vec<String> = state
            .users
            .iter()
            .filter(|u| self.resolve_role_id(&u.role_id) == role.id)
            .map(|u| u.id.clone())
            .collect();
        if !holders.is_empty() {
            return Err(DomainError::integrity(
                IntegrityRule::RoleInUse,
                format!("role in use: referenced by {} user(s)", holders.len()),
                holders,
            ));
        }
        Ok(())
    }

    pub(crate) fn validate_new_permission(
        &self,
        state: &StoreState,
        new: &NewPermission,
    ) -> Result<(), DomainError> {
        if new.subject.trim().is_empty() {
            return Err(DomainError::validation("permission subject must not be empty"));
        }
        if state
            .permissions
            .iter()
            .any(|p| p.subject == new.subject && p.action == new.action)
        {
            return Err(DomainError::duplicate(
                "permission",
                "key",
                format!("{}.{}", new.subject, new.action),
            ));
        }
        Ok(())
    }

    pub(crate) fn validate_permission_patch(
        &self,
        state: &StoreState,
        permission: &Permission,
        patch: &PermissionPatch,
    ) -> Result<(), DomainError> {
        let subject = patch.subject.as_deref().unwrap_or(&permission.subject);
        let action = patch.action.unwrap_or(permission.action);
        if subject.trim().is_empty() {
            return Err(DomainError::validation("permission subject must not be empty"));
        }
        if state
            .permissions
            .iter()
            .any(|p| p.subject == subject && p.action == action && p.id != permission.id)
        {
            return Err(DomainError::duplicate(
                "permission",
                "key",
                format!("{subject}.{action}"),
            ));
        }
        Ok(())
    }

    /// Rule 5: a permission cannot be deleted while any role holds it
    pub(crate) fn check_permission_delete(
        &self,
        state: &StoreState,
        permission_id: &str,
    ) -> Result<(), DomainError> {
        let holders: Vec<String> = state
            .role_permissions
            .iter()
            .filter(|rp| rp.permission_id == permission_id)
            .map(|rp| rp.role_id.clone())
            .collect();
        if !holders.is_empty() {
            return Err(DomainError::integrity(
                IntegrityRule::PermissionAssigned,
                format!("permission assigned: held by {} role(s)", holders.len()),
                holders,
            ));
        }
        Ok(())
    }

    /// Variant of rule 5 covering every permission of one subject at once
    pub(crate) fn check_subject_delete(
        &self,
        state: &StoreState,
        subject: &str,
    ) -> Result<(), DomainError> {
        let ids: HashSet<&str> = state
            .permissions
            .iter()
            .filter(|p| p.subject == subject)
            .map(|p| p.id.as_str())
            .collect();
        let holders: Vec<String> = state
            .role_permissions
            .iter()
            .filter(|rp| ids.contains(rp.permission_id.as_str()))
            .map(|rp| rp.role_id.clone())
            .collect();
        if !holders.is_empty() {
            return Err(DomainError::integrity(
                IntegrityRule::PermissionAssigned,
                format!(
                    "permission assigned: subject '{}' held by {} role assignment(s)",
                    subject,
                    holders.len()
                ),
                holders,
            ));
        }
        Ok(())
    }

    /// All permission ids for a set replacement must pre-exist and be unique
    pub(crate) fn validate_set_role_permissions(
        &self,
        state: &StoreState,
        permission_ids: &[String],
    ) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for id in permission_ids {
            if !seen.insert(id.as_str()) {
                return Err(DomainError::validation(format!(
                    "permission id '{id}' listed more than once"
                )));
            }
        }
        let missing: Vec<&String> = permission_ids
            .iter()
            .filter(|id| !state.permissions.iter().any(|p| p.id == **id))
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::validation(format!(
                "unknown permission id(s): {}",
                missing
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(())
    }

    /// Full invariant sweep over a loaded state (rules 1-3)
    ///
    /// Run once at startup so a corrupted persisted mirror is rejected before
    /// the store starts serving queries.
    pub(crate) fn verify_state(&self, state: &StoreState) -> Result<(), DomainError> {
        for user in &state.users {
            if !self.role_exists(state, &user.role_id) {
                return Err(DomainError::integrity(
                    IntegrityRule::UserRoleExists,
                    format!("user '{}' references missing role '{}'", user.id, user.role_id),
                    vec![user.id.clone(), user.role_id.clone()],
                ));
            }
        }
        let mut pairs = HashSet::new();
        for rp in &state.role_permissions {
            if !state.roles.iter().any(|r| r.id == rp.role_id) {
                return Err(DomainError::integrity(
                    IntegrityRule::AssignmentRoleExists,
                    format!("assignment '{}' references missing role '{}'", rp.id, rp.role_id),
                    vec![rp.id.clone(), rp.role_id.clone()],
                ));
            }
            if !state.permissions.iter().any(|p| p.id == rp.permission_id) {
                return Err(DomainError::integrity(
                    IntegrityRule::AssignmentPermissionExists,
                    format!(
                        "assignment '{}' references missing permission '{}'",
                        rp.id, rp.permission_id
                    ),
                    vec![rp.id.clone(), rp.permission_id.clone()],
                ));
            }
            if !pairs.insert((rp.role_id.as_str(), rp.permission_id.as_str())) {
                return Err(DomainError::integrity(
                    IntegrityRule::UniqueAssignment,
                    format!(
                        "duplicate assignment of permission '{}' to role '{}'",
                        rp.permission_id, rp.role_id
                    ),
                    vec![rp.role_id.clone(), rp.permission_id.clone()],
                ));
            }
        }
        Ok(())
    }
}
