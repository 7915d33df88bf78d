// CLI module for administrative operations against the local data directory

pub mod bootstrap;

use clap::{Parser, Subcommand};

use crate::app_data::AppData;
use crate::audit::AuditFilter;

/// RBAC core CLI for administrative operations
#[derive(Parser)]
#[command(name = "rbac-core")]
#[command(about = "Dynamic RBAC core CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bootstrap the system by seeding the superadmin role and the
    /// administrative permission modules
    Bootstrap,

    /// Role inspection commands
    #[command(subcommand)]
    Role(RoleCommands),

    /// User inspection commands
    #[command(subcommand)]
    User(UserCommands),

    /// Audit log commands
    #[command(subcommand)]
    Audit(AuditCommands),
}

#[derive(Subcommand)]
pub enum RoleCommands {
    /// List all roles with their permission keys
    List,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all users with their role
    List,
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Export the audit log to a CSV file
    Export {
        /// Output file path
        #[arg(short, long, default_value = "audit_export.csv")]
        output: String,

        /// Only include entries from the last N days
        #[arg(long)]
        last_days: Option<i64>,
    },

    /// Print entry counts per action kind
    Summary,
}

/// Execute CLI command
///
/// Routes the parsed CLI command to the appropriate handler function.
///
/// # Arguments
/// * `cli` - Parsed CLI arguments
/// * `app_data` - Application data containing the stores and engines
///
/// # Returns
/// * `Ok(())` - Command executed successfully
/// * `Err(...)` - Command execution failed
pub fn execute_command(cli: Cli, app_data: &AppData) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Bootstrap => {
            bootstrap::bootstrap_system(app_data)?;
        }
        Commands::Role(RoleCommands::List) => {
            for role in app_data.entity_store.get_roles() {
                let flags = [
                    role.is_admin.then_some("admin"),
                    role.is_system.then_some("system"),
                    (!role.is_active).then_some("inactive"),
                ]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(",");
                println!(
                    "{}  {}  [{}]  {} permission(s)",
                    role.id,
                    role.key,
                    flags,
                    role.permission_keys.len()
                );
            }
        }
        Commands::User(UserCommands::List) => {
            for user in app_data.entity_store.get_users() {
                let role_key = app_data
                    .entity_store
                    .get_role(&user.role_id)
                    .map(|r| r.key)
                    .unwrap_or_else(|_| user.role_id.clone());
                println!("{}  {}  {}  {}", user.id, user.username, role_key, user.status);
            }
        }
        Commands::Audit(AuditCommands::Export { output, last_days }) => {
            let filter = match last_days {
                Some(days) => AuditFilter::last_days(days),
                None => AuditFilter::all(),
            };
            let count = app_data.audit.export_to_file(&output, &filter)?;
            println!("✓ Exported {count} audit entries to {output}");
        }
        Commands::Audit(AuditCommands::Summary) => {
            let counts = app_data.audit.counts_by_action(&AuditFilter::all());
            let mut actions: Vec<_> = counts.iter().collect();
            actions.sort_by(|a, b| a.0.cmp(b.0));
            for (action, count) in actions {
                println!("{action}: {count}");
            }
        }
    }

    Ok(())
}
