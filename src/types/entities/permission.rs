use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation kind a permission governs
///
/// Closed set in practice; `All` is the action-axis wildcard (a permission
/// `("widgets", All)` covers every action on `widgets`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    All,
}

/// The four canonical CRUD actions created for every module subject
pub const CRUD_ACTIONS: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::All => "all",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk classification attached to a permission
///
/// Source data does not always carry this field; absent values default to
/// `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// Permission entity
///
/// Identified in ability queries by its key `"<subject>.<action>"`, e.g.
/// `"security-group.read"`. The subject `"all"` is the subject-axis
/// wildcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub action: Action,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub requires_approval: bool,
}

impl Permission {
    /// The `"<subject>.<action>"` lookup key for this permission
    pub fn key(&self) -> String {
        format!("{}.{}", self.subject, self.action)
    }
}

/// Input for creating a permission
///
/// Optional metadata defaults to `RiskLevel::Low` / no approval required.
#[derive(Debug, Clone)]
pub struct NewPermission {
    pub action: Action,
    pub subject: String,
    pub description: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub requires_approval: Option<bool>,
}

impl NewPermission {
    pub fn new(action: Action, subject: impl Into<String>) -> Self {
        Self {
            action,
            subject: subject.into(),
            description: None,
            risk_level: None,
            requires_approval: None,
        }
    }
}

/// Partial update for a permission
#[derive(Debug, Clone, Default)]
pub struct PermissionPatch {
    pub action: Option<Action>,
    pub subject: Option<String>,
    pub description: Option<Option<String>>,
    pub risk_level: Option<RiskLevel>,
    pub requires_approval: Option<bool>,
}
