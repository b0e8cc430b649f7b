//! Database migration command handler.

use escoffier::{EscoffierConfig, runtime};
use escoffier_error::EscoffierResult;

/// Handle the `migrate` command
pub async fn handle_migrate_command(config: &EscoffierConfig) -> EscoffierResult<()> {
    let applied = runtime::migrate(config).await?;
    if applied.is_empty() {
        println!("Database is up to date");
    }
    for version in applied {
        println!("Applied {version}");
    }
    Ok(())
}
