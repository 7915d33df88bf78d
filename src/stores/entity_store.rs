use std::sync::{Arc, RwLock, RwLockReadGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::audit::{AuditEntryBuilder, AuditRecorder};
use crate::errors::DomainError;
use crate::integrity::IntegrityEnforcer;
use crate::stores::persistence::{self, Collection, PersistenceAdapter};
use crate::types::entities::{
    NewPermission, NewRole, NewUser, Permission, PermissionPatch, Role, RolePatch,
    RolePermission, User, UserPatch, CRUD_ACTIONS,
};
use crate::types::internal::{AuditAction, EntityKind, RequestContext};

/// The authoritative collections, always mutated as one unit
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    pub(crate) users: Vec<User>,
    pub(crate) roles: Vec<Role>,
    pub(crate) permissions: Vec<Permission>,
    pub(crate) role_permissions: Vec<RolePermission>,
}

/// Authoritative in-memory store for users, roles, permissions and
/// role-permission assignments
///
/// Every mutation runs under the single write lock: integrity validation,
/// the in-memory change, the persistence flush of each touched collection,
/// and the audit append commit together or not at all. Readers only ever
/// observe fully committed states. Reads return clones of committed
/// entities, so no caller can mutate the store around the lock.
pub struct EntityStore {
    state: RwLock<StoreState>,
    persistence: Arc<dyn PersistenceAdapter>,
    audit: Arc<AuditRecorder>,
    integrity: IntegrityEnforcer,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("state", &self.state)
            .field("integrity", &self.integrity)
            .finish_non_exhaustive()
    }
}

impl EntityStore {
    /// Load all collections through the adapter and verify their invariants
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` when a collection fails to load and
    /// `DomainError::Integrity` when the persisted mirror violates the
    /// referential rules.
    pub fn load(
        persistence: Arc<dyn PersistenceAdapter>,
        audit: Arc<AuditRecorder>,
        integrity: IntegrityEnforcer,
    ) -> Result<Self, DomainError> {
        let state = StoreState {
            users: persistence::load_collection(persistence.as_ref(), Collection::Users)?,
            roles: persistence::load_collection(persistence.as_ref(), Collection::Roles)?,
            permissions: persistence::load_collection(
                persistence.as_ref(),
                Collection::Permissions,
            )?,
            role_permissions: persistence::load_collection(
                persistence.as_ref(),
                Collection::RolePermissions,
            )?,
        };
        integrity.verify_state(&state)?;
        tracing::info!(
            users = state.users.len(),
            roles = state.roles.len(),
            permissions = state.permissions.len(),
            assignments = state.role_permissions.len(),
            "entity store loaded"
        );
        Ok(Self {
            state: RwLock::new(state),
            persistence,
            audit,
            integrity,
        })
    }

    pub fn integrity(&self) -> &IntegrityEnforcer {
        &self.integrity
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().expect("entity store lock poisoned")
    }

    /// Flush each touched collection through the adapter, in order
    fn flush(&self, state: &StoreState, touched: &[Collection]) -> Result<(), DomainError> {
        for collection in touched {
            match collection {
                Collection::Users => persistence::save_collection(
                    self.persistence.as_ref(),
                    Collection::Users,
                    &state.users,
                )?,
                Collection::Roles => persistence::save_collection(
                    self.persistence.as_ref(),
                    Collection::Roles,
                    &state.roles,
                )?,
                Collection::Permissions => persistence::save_collection(
                    self.persistence.as_ref(),
                    Collection::Permissions,
                    &state.permissions,
                )?,
                Collection::RolePermissions => persistence::save_collection(
                    self.persistence.as_ref(),
                    Collection::RolePermissions,
                    &state.role_permissions,
                )?,
                Collection::AuditLog => {
                    unreachable!("audit log is flushed by the recorder")
                }
            }
        }
        Ok(())
    }

    /// Commit an applied mutation: flush touched collections, then append
    /// the audit entry. Any failure restores `prev` (in memory and, best
    /// effort, on the persisted mirror) before surfacing the error.
    fn commit(
        &self,
        state: &mut StoreState,
        prev: StoreState,
        touched: &[Collection],
        entry: AuditEntryBuilder,
    ) -> Result<(), DomainError> {
        if let Err(err) = self.flush(state, touched) {
            self.rollback(state, prev, touched, "flush_failed");
            return Err(err);
        }
        if let Err(err) = entry.record() {
            self.rollback(state, prev, touched, "audit_append_failed");
            return Err(err);
        }
        Ok(())
    }

    fn rollback(
        &self,
        state: &mut StoreState,
        prev: StoreState,
        touched: &[Collection],
        cause: &str,
    ) {
        *state = prev;
        tracing::warn!(cause, "mutation rolled back");
        if let Err(err) = self.flush(state, touched) {
            tracing::error!(error = %err, "failed to restore persisted mirror after rollback");
        }
    }

    /// Rebuild a role's denormalized permission-key cache from its
    /// assignments and advance its `updated_at` stamp
    fn rebuild_permission_keys(state: &mut StoreState, role_id: &str) {
        let mut keys: Vec<String> = state
            .role_permissions
            .iter()
            .filter(|rp| rp.role_id == role_id)
            .filter_map(|rp| {
                state
                    .permissions
                    .iter()
                    .find(|p| p.id == rp.permission_id)
                    .map(Permission::key)
            })
            .collect();
        keys.sort();
        if let Some(role) = state.roles.iter_mut().find(|r| r.id == role_id) {
            role.permission_keys = keys;
            role.touch();
        }
    }

    // ============================================================
    // Users
    // ============================================================

    pub fn get_users(&self) -> Vec<User> {
        self.read_state().users.clone()
    }

    pub fn get_user(&self, id: &str) -> Result<User, DomainError> {
        self.read_state()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("user", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<User, DomainError> {
        self.read_state()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| DomainError::not_found("user", username))
    }

    /// Create a user with a fresh id; `role_id` must reference an existing
    /// role
    pub fn create_user(&self, ctx: &RequestContext, new: NewUser) -> Result<User, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        self.integrity.validate_new_user(&state, &new)?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            role_id: new.role_id,
            status: new.status,
            created_at: Utc::now(),
            last_login: None,
        };
        let prev = state.clone();
        state.users.push(user.clone());

        let entry = self
            .audit
            .builder(AuditAction::Create, EntityKind::User)
            .with_context(ctx)
            .entity(&user.id, &user.username)
            .after(&user);
        self.commit(&mut state, prev, &[Collection::Users], entry)?;
        tracing::info!(user_id = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// Apply a partial update; the username is not updatable after creation
    pub fn update_user(
        &self,
        ctx: &RequestContext,
        id: &str,
        patch: UserPatch,
    ) -> Result<User, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        self.integrity.validate_user_patch(&state, &patch)?;

        let position = state
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| DomainError::not_found("user", id))?;
        let prev = state.clone();
        let before = state.users[position].clone();

        let user = &mut state.users[position];
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(full_name) = patch.full_name {
            user.full_name = full_name;
        }
        if let Some(role_id) = patch.role_id {
            user.role_id = role_id;
        }
        if let Some(status) = patch.status {
            user.status = status;
        }
        let user = user.clone();

        let entry = self
            .audit
            .builder(AuditAction::Update, EntityKind::User)
            .with_context(ctx)
            .entity(&user.id, &user.username)
            .before(&before)
            .after(&user);
        self.commit(&mut state, prev, &[Collection::Users], entry)?;
        Ok(user)
    }

    /// Delete a user; unconditional, users have no referential dependents
    pub fn delete_user(&self, ctx: &RequestContext, id: &str) -> Result<(), DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        let position = state
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| DomainError::not_found("user", id))?;
        let prev = state.clone();
        let user = state.users.remove(position);

        let entry = self
            .audit
            .builder(AuditAction::Delete, EntityKind::User)
            .with_context(ctx)
            .entity(&user.id, &user.username)
            .before(&user);
        self.commit(&mut state, prev, &[Collection::Users], entry)?;
        tracing::info!(user_id = %user.id, "user deleted");
        Ok(())
    }

    /// Stamp a successful login on the user and audit it
    pub fn record_login(&self, ctx: &RequestContext, id: &str) -> Result<User, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        let position = state
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| DomainError::not_found("user", id))?;
        let prev = state.clone();
        state.users[position].last_login = Some(Utc::now());
        let user = state.users[position].clone();

        let entry = self
            .audit
            .builder(AuditAction::Login, EntityKind::User)
            .with_context(ctx)
            .entity(&user.id, &user.username);
        self.commit(&mut state, prev, &[Collection::Users], entry)?;
        Ok(user)
    }

    // ============================================================
    // Roles
    // ============================================================

    pub fn get_roles(&self) -> Vec<Role> {
        self.read_state().roles.clone()
    }

    /// Look up a role by id, resolving legacy ids through the alias table
    pub fn get_role(&self, id: &str) -> Result<Role, DomainError> {
        let resolved = self.integrity.resolve_role_id(id).to_string();
        self.read_state()
            .roles
            .iter()
            .find(|r| r.id == resolved)
            .cloned()
            .ok_or_else(|| DomainError::not_found("role", id))
    }

    pub fn get_role_by_key(&self, key: &str) -> Result<Role, DomainError> {
        self.read_state()
            .roles
            .iter()
            .find(|r| r.key == key)
            .cloned()
            .ok_or_else(|| DomainError::not_found("role", key))
    }

    /// The role of a user, following the user's stored (possibly legacy)
    /// role id
    pub fn role_for_user(&self, user_id: &str) -> Result<Role, DomainError> {
        let role_id = self.get_user(user_id)?.role_id;
        self.get_role(&role_id)
    }

    pub fn create_role(&self, ctx: &RequestContext, new: NewRole) -> Result<Role, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        self.integrity.validate_new_role(&state, &new)?;

        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            key: new.key,
            description: new.description,
            is_admin: new.is_admin,
            is_active: new.is_active,
            is_system: new.is_system,
            created_at: now,
            updated_at: now,
            permission_keys: Vec::new(),
        };
        let prev = state.clone();
        state.roles.push(role.clone());

        let entry = self
            .audit
            .builder(AuditAction::Create, EntityKind::Role)
            .with_context(ctx)
            .entity(&role.id, &role.name)
            .after(&role);
        self.commit(&mut state, prev, &[Collection::Roles], entry)?;
        tracing::info!(role_id = %role.id, key = %role.key, "role created");
        Ok(role)
    }

    /// Apply a partial update; system roles reject changes to `key` and
    /// `is_system`
    pub fn update_role(
        &self,
        ctx: &RequestContext,
        id: &str,
        patch: RolePatch,
    ) -> Result<Role, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        let position = state
            .roles
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| DomainError::not_found("role", id))?;
        let before = state.roles[position].clone();
        self.integrity.validate_role_patch(&state, &before, &patch)?;
        let prev = state.clone();

        let role = &mut state.roles[position];
        if let Some(name) = patch.name {
            role.name = name;
        }
        if let Some(key) = patch.key {
            role.key = key;
        }
        if let Some(description) = patch.description {
            role.description = description;
        }
        if let Some(is_admin) = patch.is_admin {
            role.is_admin = is_admin;
        }
        if let Some(is_active) = patch.is_active {
            role.is_active = is_active;
        }
        if let Some(is_system) = patch.is_system {
            role.is_system = is_system;
        }
        role.touch();
        let role = role.clone();

        let entry = self
            .audit
            .builder(AuditAction::Update, EntityKind::Role)
            .with_context(ctx)
            .entity(&role.id, &role.name)
            .before(&before)
            .after(&role);
        self.commit(&mut state, prev, &[Collection::Roles], entry)?;
        Ok(role)
    }

    /// Delete a role and its permission assignments
    ///
    /// Fails while any user references the role (directly or through a
    /// legacy id) and for system roles.
    pub fn delete_role(&self, ctx: &RequestContext, id: &str) -> Result<(), DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        let role = state
            .roles
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("role", id))?;
        self.integrity.check_role_delete(&state, &role)?;

        let prev = state.clone();
        state.roles.retain(|r| r.id != id);
        state.role_permissions.retain(|rp| rp.role_id != id);

        let entry = self
            .audit
            .builder(AuditAction::Delete, EntityKind::Role)
            .with_context(ctx)
            .entity(&role.id, &role.name)
            .before(&role);
        self.commit(
            &mut state,
            prev,
            &[Collection::Roles, Collection::RolePermissions],
            entry,
        )?;
        tracing::info!(role_id = %role.id, key = %role.key, "role deleted");
        Ok(())
    }

    // ============================================================
    // Permissions
    // ============================================================

    pub fn get_permissions(&self) -> Vec<Permission> {
        self.read_state().permissions.clone()
    }

    pub fn get_permission(&self, id: &str) -> Result<Permission, DomainError> {
        self.read_state()
            .permissions
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("permission", id))
    }

    pub fn permissions_for_subject(&self, subject: &str) -> Vec<Permission> {
        self.read_state()
            .permissions
            .iter()
            .filter(|p| p.subject == subject)
            .cloned()
            .collect()
    }

    pub fn role_permissions_for(&self, role_id: &str) -> Vec<RolePermission> {
        self.read_state()
            .role_permissions
            .iter()
            .filter(|rp| rp.role_id == role_id)
            .cloned()
            .collect()
    }

    pub fn create_permission(
        &self,
        ctx: &RequestContext,
        new: NewPermission,
    ) -> Result<Permission, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        self.integrity.validate_new_permission(&state, &new)?;

        let permission = Permission {
            id: Uuid::new_v4().to_string(),
            action: new.action,
            subject: new.subject,
            description: new.description,
            risk_level: new.risk_level.unwrap_or_default(),
            requires_approval: new.requires_approval.unwrap_or(false),
        };
        let prev = state.clone();
        state.permissions.push(permission.clone());

        let entry = self
            .audit
            .builder(AuditAction::Create, EntityKind::Permission)
            .with_context(ctx)
            .entity(&permission.id, permission.key())
            .after(&permission);
        self.commit(&mut state, prev, &[Collection::Permissions], entry)?;
        Ok(permission)
    }

    /// Apply a partial update
    ///
    /// When the subject or action changes, the permission key changes with
    /// it, so the denormalized key cache of every role holding the
    /// permission is rebuilt in the same commit.
    pub fn update_permission(
        &self,
        ctx: &RequestContext,
        id: &str,
        patch: PermissionPatch,
    ) -> Result<Permission, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        let position = state
            .permissions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| DomainError::not_found("permission", id))?;
        let before = state.permissions[position].clone();
        self.integrity
            .validate_permission_patch(&state, &before, &patch)?;
        let prev = state.clone();

        let permission = &mut state.permissions[position];
        if let Some(action) = patch.action {
            permission.action = action;
        }
        if let Some(subject) = patch.subject {
            permission.subject = subject;
        }
        if let Some(description) = patch.description {
            permission.description = description;
        }
        if let Some(risk_level) = patch.risk_level {
            permission.risk_level = risk_level;
        }
        if let Some(requires_approval) = patch.requires_approval {
            permission.requires_approval = requires_approval;
        }
        let permission = state.permissions[position].clone();

        let mut touched = vec![Collection::Permissions];
        if permission.key() != before.key() {
            let holders: Vec<String> = state
                .role_permissions
                .iter()
                .filter(|rp| rp.permission_id == id)
                .map(|rp| rp.role_id.clone())
                .collect();
            for role_id in holders {
                Self::rebuild_permission_keys(&mut state, &role_id);
            }
            touched.push(Collection::Roles);
        }

        let entry = self
            .audit
            .builder(AuditAction::Update, EntityKind::Permission)
            .with_context(ctx)
            .entity(&permission.id, permission.key())
            .before(&before)
            .after(&permission);
        self.commit(&mut state, prev, &touched, entry)?;
        Ok(permission)
    }

    /// Delete a permission; fails while any role assignment references it
    pub fn delete_permission(&self, ctx: &RequestContext, id: &str) -> Result<(), DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        let permission = state
            .permissions
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("permission", id))?;
        self.integrity.check_permission_delete(&state, id)?;

        let prev = state.clone();
        state.permissions.retain(|p| p.id != id);

        let entry = self
            .audit
            .builder(AuditAction::Delete, EntityKind::Permission)
            .with_context(ctx)
            .entity(&permission.id, permission.key())
            .before(&permission);
        self.commit(&mut state, prev, &[Collection::Permissions], entry)?;
        Ok(())
    }

    /// Bulk-create the four canonical CRUD permissions for a new subject
    ///
    /// Atomic: fails with a duplicate error when any of the four already
    /// exists for the subject, leaving no partial set behind.
    pub fn create_module_permissions(
        &self,
        ctx: &RequestContext,
        subject: &str,
    ) -> Result<Vec<Permission>, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        if subject.trim().is_empty() {
            return Err(DomainError::validation("permission subject must not be empty"));
        }
        for action in CRUD_ACTIONS {
            if state
                .permissions
                .iter()
                .any(|p| p.subject == subject && p.action == action)
            {
                return Err(DomainError::duplicate(
                    "permission",
                    "key",
                    format!("{subject}.{action}"),
                ));
            }
        }

        let prev = state.clone();
        let created: Vec<Permission> = CRUD_ACTIONS
            .into_iter()
            .map(|action| Permission {
                id: Uuid::new_v4().to_string(),
                action,
                subject: subject.to_string(),
                description: None,
                risk_level: Default::default(),
                requires_approval: false,
            })
            .collect();
        state.permissions.extend(created.iter().cloned());

        let keys: Vec<String> = created.iter().map(Permission::key).collect();
        let entry = self
            .audit
            .builder(AuditAction::Create, EntityKind::Permission)
            .with_context(ctx)
            .entity(subject, subject)
            .after(serde_json::json!({ "keys": keys }));
        self.commit(&mut state, prev, &[Collection::Permissions], entry)?;
        tracing::info!(subject, "module permissions created");
        Ok(created)
    }

    /// Delete every permission of a subject
    ///
    /// Fails while any of them is assigned to a role; returns the number of
    /// permissions removed.
    pub fn delete_module_permissions(
        &self,
        ctx: &RequestContext,
        subject: &str,
    ) -> Result<usize, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        let removed: Vec<Permission> = state
            .permissions
            .iter()
            .filter(|p| p.subject == subject)
            .cloned()
            .collect();
        if removed.is_empty() {
            return Err(DomainError::not_found("permission", subject));
        }
        self.integrity.check_subject_delete(&state, subject)?;

        let prev = state.clone();
        state.permissions.retain(|p| p.subject != subject);

        let keys: Vec<String> = removed.iter().map(Permission::key).collect();
        let entry = self
            .audit
            .builder(AuditAction::Delete, EntityKind::Permission)
            .with_context(ctx)
            .entity(subject, subject)
            .before(serde_json::json!({ "keys": keys }));
        self.commit(&mut state, prev, &[Collection::Permissions], entry)?;
        tracing::info!(subject, count = removed.len(), "module permissions deleted");
        Ok(removed.len())
    }

    // ============================================================
    // Role-permission assignments
    // ============================================================

    /// Replace a role's entire permission set atomically
    ///
    /// All `permission_ids` must pre-exist; otherwise nothing changes. The
    /// role's denormalized key cache is rebuilt and its `updated_at` stamp
    /// advanced in the same commit, which is what invalidates any cached
    /// ability for the role.
    pub fn set_role_permissions(
        &self,
        ctx: &RequestContext,
        role_id: &str,
        permission_ids: Vec<String>,
    ) -> Result<Role, DomainError> {
        let mut state = self.state.write().expect("entity store lock poisoned");
        let before = state
            .roles
            .iter()
            .find(|r| r.id == role_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("role", role_id))?;
        self.integrity
            .validate_set_role_permissions(&state, &permission_ids)?;

        let prev = state.clone();
        state.role_permissions.retain(|rp| rp.role_id != role_id);
        for permission_id in &permission_ids {
            state.role_permissions.push(RolePermission {
                id: Uuid::new_v4().to_string(),
                role_id: role_id.to_string(),
                permission_id: permission_id.clone(),
            });
        }
        Self::rebuild_permission_keys(&mut state, role_id);
        let role = state
            .roles
            .iter()
            .find(|r| r.id == role_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("role", role_id))?;

        let entry = self
            .audit
            .builder(AuditAction::RoleChange, EntityKind::Role)
            .with_context(ctx)
            .entity(&role.id, &role.name)
            .before(serde_json::json!({ "permission_keys": before.permission_keys }))
            .after(serde_json::json!({ "permission_keys": role.permission_keys }));
        self.commit(
            &mut state,
            prev,
            &[Collection::RolePermissions, Collection::Roles],
            entry,
        )?;
        tracing::info!(
            role_id = %role.id,
            permissions = role.permission_keys.len(),
            "role permission set replaced"
        );
        Ok(role)
    }
}
