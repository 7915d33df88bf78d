use clap::Parser;

use rbac_core::app_data::AppData;
use rbac_core::cli::{execute_command, Cli};
use rbac_core::config::{init_logging, StoreSettings};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_logging()?;

    let cli = Cli::parse();
    let settings = StoreSettings::from_env();
    let app_data = AppData::init(settings)?;

    execute_command(cli, &app_data)
}
