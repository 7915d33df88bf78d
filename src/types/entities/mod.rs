// Domain entities held by the entity store

pub mod permission;
pub mod role;
pub mod role_permission;
pub mod user;

pub use permission::{Action, NewPermission, Permission, PermissionPatch, RiskLevel, CRUD_ACTIONS};
pub use role::{is_valid_role_key, NewRole, Role, RolePatch};
pub use role_permission::RolePermission;
pub use user::{NewUser, User, UserPatch, UserStatus};
