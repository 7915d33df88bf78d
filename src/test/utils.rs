// Test utilities shared across unit tests
// Only compiled when running tests

use std::sync::Arc;

use crate::ability::AbilityEngine;
use crate::audit::AuditRecorder;
use crate::integrity::IntegrityEnforcer;
use crate::stores::{EntityStore, MemoryAdapter, PersistenceAdapter};
use crate::types::entities::{Action, NewPermission, NewRole, NewUser, UserStatus};
use crate::types::internal::RequestContext;

/// Creates an in-memory store stack with standard configuration
///
/// Returns (entity_store, audit, adapter)
///
/// Callers can discard what they don't need:
/// ```rust,ignore
/// let (store, _audit, _adapter) = setup_test_store();
/// ```
pub fn setup_test_store() -> (Arc<EntityStore>, Arc<AuditRecorder>, Arc<MemoryAdapter>) {
    let adapter = Arc::new(MemoryAdapter::new());
    let persistence: Arc<dyn PersistenceAdapter> = adapter.clone();
    let audit = Arc::new(
        AuditRecorder::load(persistence.clone()).expect("failed to load test audit recorder"),
    );
    let store = Arc::new(
        EntityStore::load(persistence, audit.clone(), IntegrityEnforcer::new())
            .expect("failed to load test entity store"),
    );
    (store, audit, adapter)
}

/// Store stack plus an ability engine on top
pub fn setup_test_engine() -> (Arc<EntityStore>, Arc<AuditRecorder>, AbilityEngine) {
    let (store, audit, _) = setup_test_store();
    let engine = AbilityEngine::new(Arc::clone(&store));
    (store, audit, engine)
}

pub fn test_context() -> RequestContext {
    RequestContext::new("test-admin", "Test Admin")
}

pub fn create_test_role(store: &EntityStore, key: &str) -> String {
    store
        .create_role(&test_context(), NewRole::named(key, key))
        .expect("failed to create test role")
        .id
}

pub fn create_test_permission(store: &EntityStore, action: Action, subject: &str) -> String {
    store
        .create_permission(&test_context(), NewPermission::new(action, subject))
        .expect("failed to create test permission")
        .id
}

pub fn create_test_user(store: &EntityStore, username: &str, role_id: &str) -> String {
    store
        .create_user(
            &test_context(),
            NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                full_name: username.to_string(),
                role_id: role_id.to_string(),
                status: UserStatus::Active,
            },
        )
        .expect("failed to create test user")
        .id
}
