// Common test utilities for integration tests

use std::sync::Arc;

use rbac_core::app_data::AppData;
use rbac_core::config::StoreSettings;
use rbac_core::stores::MemoryAdapter;
use rbac_core::types::entities::{Action, NewPermission, NewRole, NewUser, UserStatus};
use rbac_core::types::internal::RequestContext;

/// Creates a full application stack over an in-memory adapter
pub fn setup_app() -> (AppData, Arc<MemoryAdapter>) {
    let adapter = Arc::new(MemoryAdapter::new());
    let app = AppData::with_adapter(StoreSettings::with_data_dir("unused"), adapter.clone())
        .expect("failed to initialize test app");
    (app, adapter)
}

pub fn admin_context() -> RequestContext {
    RequestContext::new("admin-1", "Admin")
}

pub fn create_role(app: &AppData, key: &str) -> String {
    app.entity_store
        .create_role(&admin_context(), NewRole::named(key, key))
        .expect("failed to create role")
        .id
}

pub fn create_permission(app: &AppData, action: Action, subject: &str) -> String {
    app.entity_store
        .create_permission(&admin_context(), NewPermission::new(action, subject))
        .expect("failed to create permission")
        .id
}

pub fn create_user(app: &AppData, username: &str, role_id: &str) -> String {
    app.entity_store
        .create_user(
            &admin_context(),
            NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                full_name: username.to_string(),
                role_id: role_id.to_string(),
                status: UserStatus::Active,
            },
        )
        .expect("failed to create user")
        .id
}
