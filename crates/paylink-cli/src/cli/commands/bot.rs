//! Bot command handler.

use anyhow::Result;
use paylink_core::config::Config;

pub async fn run(config: Config) -> Result<()> {
    paylink_bot::run(config).await
}
