//! Status query command handler.

use super::generate::print_json;
use escoffier::{EscoffierConfig, Stores, runtime};
use escoffier_error::EscoffierResult;

/// Handle the `status` command
pub async fn handle_status_command(config: &EscoffierConfig, id: &str) -> EscoffierResult<()> {
    let stores = Stores::postgres(config).await?;
    let report = runtime::service(&stores).get_status(id).await?;
    print_json(&report)
}
