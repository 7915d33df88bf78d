use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of audited actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    RoleChange,
    Custom(String),
}

impl AuditAction {
    /// String representation stored and exported with each entry
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Login => "login",
            Self::RoleChange => "role_change",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for AuditAction {
    fn from(s: &str) -> Self {
        AuditAction::Custom(s.to_string())
    }
}

/// Entity type an audit entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Role,
    Permission,
    RolePermission,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Role => "role",
            Self::Permission => "permission",
            Self::RolePermission => "role_permission",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable audit record for one committed mutation
///
/// Appended by the audit recorder, which assigns `id` and `timestamp`; never
/// mutated or deleted afterwards. `before`/`after` hold JSON snapshots of the
/// affected entity (absent for pure creations/deletions respectively).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_name: String,
    pub action: AuditAction,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub entity_name: String,
    #[serde(default)]
    pub before: Option<serde_json::Value>,
    #[serde(default)]
    pub after: Option<serde_json::Value>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl AuditEntry {
    /// Human-readable one-line summary of the change, used in exports
    pub fn summary(&self) -> String {
        match &self.action {
            AuditAction::Create => {
                format!("created {} '{}'", self.entity_kind, self.entity_name)
            }
            AuditAction::Delete => {
                format!("deleted {} '{}'", self.entity_kind, self.entity_name)
            }
            AuditAction::Update => {
                let fields = changed_fields(self.before.as_ref(), self.after.as_ref());
                if fields.is_empty() {
                    format!("updated {} '{}'", self.entity_kind, self.entity_name)
                } else {
                    format!(
                        "updated {} '{}' ({})",
                        self.entity_kind,
                        self.entity_name,
                        fields.join(", ")
                    )
                }
            }
            AuditAction::Login => format!("user '{}' logged in", self.entity_name),
            AuditAction::RoleChange => {
                format!("replaced permission set of role '{}'", self.entity_name)
            }
            AuditAction::Custom(s) => {
                format!("{} {} '{}'", s, self.entity_kind, self.entity_name)
            }
        }
    }
}

/// Names of top-level fields whose values differ between two JSON snapshots
///
/// Union of keys from both objects, sorted for stable output. Non-object
/// payloads yield an empty list.
pub fn changed_fields(
    before: Option<&serde_json::Value>,
    after: Option<&serde_json::Value>,
) -> Vec<String> {
    let (Some(serde_json::Value::Object(before)), Some(serde_json::Value::Object(after))) =
        (before, after)
    else {
        return Vec::new();
    };
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter(|k| before.get(*k) != after.get(*k))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(action: AuditAction) -> AuditEntry {
        AuditEntry {
            id: "a1".to_string(),
            timestamp: Utc::now(),
            actor_id: "u1".to_string(),
            actor_name: "Alice".to_string(),
            action,
            entity_kind: EntityKind::User,
            entity_id: "u2".to_string(),
            entity_name: "bob".to_string(),
            before: None,
            after: None,
            reason: None,
        }
    }

    #[test]
    fn changed_fields_diffs_top_level_keys() {
        let before = json!({"email": "a@x", "status": "active", "full_name": "Bob"});
        let after = json!({"email": "b@x", "status": "active", "full_name": "Bob"});
        assert_eq!(changed_fields(Some(&before), Some(&after)), vec!["email"]);
    }

    #[test]
    fn changed_fields_handles_missing_payloads() {
        assert!(changed_fields(None, Some(&json!({"a": 1}))).is_empty());
        assert!(changed_fields(None, None).is_empty());
    }

    #[test]
    fn update_summary_names_changed_fields() {
        let mut e = entry(AuditAction::Update);
        e.before = Some(json!({"email": "a@x", "status": "active"}));
        e.after = Some(json!({"email": "b@x", "status": "suspended"}));
        assert_eq!(e.summary(), "updated user 'bob' (email, status)");
    }

    #[test]
    fn create_summary_is_terse() {
        assert_eq!(entry(AuditAction::Create).summary(), "created user 'bob'");
    }
}
