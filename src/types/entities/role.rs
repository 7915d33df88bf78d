use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Role entity
///
/// `key` is the unique machine-readable identifier (lowercase letters,
/// digits, underscores). `permission_keys` is a denormalized cache of the
/// role's assigned permissions, rebuilt by the store on every permission-set
/// change; the ability engine keys its cache off `updated_at`, so every
/// mutation of a role must go through [`Role::touch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub key: String,
    pub description: String,
    /// Superadmin flag: when true the role bypasses all permission checks
    pub is_admin: bool,
    pub is_active: bool,
    /// System roles cannot be deleted; `key` and `is_system` are immutable
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub permission_keys: Vec<String>,
}

impl Role {
    /// Advance `updated_at`, strictly monotonically
    ///
    /// Two commits within the same clock tick must still produce distinct
    /// stamps, otherwise a cached ability could survive a change.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}

/// Input for creating a role
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub key: String,
    pub description: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub is_system: bool,
}

impl NewRole {
    /// Convenience constructor for an ordinary (non-admin, non-system) role
    pub fn named(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            description: String::new(),
            is_admin: false,
            is_active: true,
            is_system: false,
        }
    }
}

/// Partial update for a role
///
/// `key` and `is_system` are rejected for system roles by the integrity
/// layer.
#[derive(Debug, Clone, Default)]
pub struct RolePatch {
    pub name: Option<String>,
    pub key: Option<String>,
    pub description: Option<String>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub is_system: Option<bool>,
}

/// Whether a string is a valid role key (non-empty, `[a-z0-9_]` only)
pub fn is_valid_role_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
