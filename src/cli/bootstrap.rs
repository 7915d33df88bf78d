// Bootstrap command implementation
// Seeds the superadmin system role and the administrative permission modules

use crate::app_data::AppData;
use crate::types::entities::NewRole;
use crate::types::internal::RequestContext;

/// Subjects every installation needs permissions for
const ADMIN_SUBJECTS: [&str; 4] = ["users", "roles", "permissions", "audit"];

const SUPERADMIN_KEY: &str = "superadmin";

/// Bootstrap the system
///
/// Creates the `superadmin` system role (admin bypass, undeletable) and the
/// CRUD permission set for each administrative subject. Refuses to run when
/// the superadmin role already exists.
///
/// # Returns
/// * `Ok(())` - Bootstrap completed successfully
/// * `Err(...)` - Bootstrap failed (e.g., system already bootstrapped)
pub fn bootstrap_system(app_data: &AppData) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n=== RBAC Core Bootstrap ===\n");

    if app_data.entity_store.get_role_by_key(SUPERADMIN_KEY).is_ok() {
        return Err("System already bootstrapped".into());
    }

    let ctx = RequestContext::cli("bootstrap");

    let role = app_data.entity_store.create_role(
        &ctx,
        NewRole {
            name: "Superadmin".to_string(),
            key: SUPERADMIN_KEY.to_string(),
            description: "Full administrative access".to_string(),
            is_admin: true,
            is_active: true,
            is_system: true,
        },
    )?;
    println!("✓ Created system role '{}' ({})", role.key, role.id);

    for subject in ADMIN_SUBJECTS {
        let created = app_data
            .entity_store
            .create_module_permissions(&ctx, subject)?;
        println!("✓ Created {} permissions for '{subject}'", created.len());
    }

    println!("\nBootstrap complete.");
    Ok(())
}
