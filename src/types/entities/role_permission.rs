use serde::{Deserialize, Serialize};

/// Join entity linking a role to a permission
///
/// Unique per `(role_id, permission_id)` pair; both sides must reference
/// existing entities (integrity rules 2 and 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePermission {
    pub id: String,
    pub role_id: String,
    pub permission_id: String,
}
