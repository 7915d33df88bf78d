use std::fmt;

use thiserror::Error;

/// Error type for all entity store, integrity, and audit operations
///
/// This is the single error surface of the RBAC core. Every mutating
/// operation is all-or-nothing: when any variant below is returned, the
/// entity store and the audit trail are exactly as they were before the call.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Malformed input or a missing/invalid required field
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// A referenced entity id does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated
    #[error("Duplicate {entity}: {field} '{value}' already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// A referential-integrity rule was violated
    ///
    /// Carries the violated rule and the offending entity id(s) so callers
    /// can report exactly which references block the operation.
    #[error("Integrity violation ({rule}): {message}")]
    Integrity {
        rule: IntegrityRule,
        message: String,
        entity_ids: Vec<String>,
    },

    /// A protected field on a system entity cannot be changed
    #[error("Field '{field}' on {entity} '{id}' is immutable")]
    ImmutableField {
        entity: &'static str,
        field: &'static str,
        id: String,
    },

    /// The persistence adapter failed to load or flush a collection
    #[error("Persistence error: {operation} '{collection}' failed: {message}")]
    Persistence {
        operation: &'static str,
        collection: String,
        message: String,
    },
}

impl DomainError {
    /// Create a validation error with a message
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error for an entity kind and id
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a duplicate error for a unique field
    pub fn duplicate(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            field,
            value: value.into(),
        }
    }

    /// Create an integrity error with the violated rule and offending ids
    pub fn integrity(
        rule: IntegrityRule,
        message: impl Into<String>,
        entity_ids: Vec<String>,
    ) -> Self {
        Self::Integrity {
            rule,
            message: message.into(),
            entity_ids,
        }
    }

    /// Create an immutable-field error
    pub fn immutable_field(
        entity: &'static str,
        field: &'static str,
        id: impl Into<String>,
    ) -> Self {
        Self::ImmutableField {
            entity,
            field,
            id: id.into(),
        }
    }

    /// Create a persistence error with operation context
    pub fn persistence(
        operation: &'static str,
        collection: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Persistence {
            operation,
            collection: collection.into(),
            message: message.into(),
        }
    }
}

/// Referential-integrity rules enforced before every commit
///
/// Each rule corresponds to one invariant that must hold over the committed
/// collections at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityRule {
    /// Every User.role_id resolves to an existing Role
    UserRoleExists,
    /// Every RolePermission.role_id resolves to an existing Role
    AssignmentRoleExists,
    /// Every RolePermission.permission_id resolves to an existing Permission
    AssignmentPermissionExists,
    /// No duplicate (role_id, permission_id) pair
    UniqueAssignment,
    /// A Role cannot be deleted while at least one User references it
    RoleInUse,
    /// A Permission cannot be deleted while at least one RolePermission references it
    PermissionAssigned,
    /// System roles cannot be deleted and their protected fields are immutable
    SystemRoleProtected,
}

impl IntegrityRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRoleExists => "user_role_exists",
            Self::AssignmentRoleExists => "assignment_role_exists",
            Self::AssignmentPermissionExists => "assignment_permission_exists",
            Self::UniqueAssignment => "unique_assignment",
            Self::RoleInUse => "role_in_use",
            Self::PermissionAssigned => "permission_assigned",
            Self::SystemRoleProtected => "system_role_protected",
        }
    }
}

impl fmt::Display for IntegrityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
