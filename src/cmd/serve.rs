//! API server command: `taskboard serve`.

use anyhow::Result;
use taskboard::board::server::{ServerConfig, start_server};
use taskboard::config::TaskboardConfig;
use tracing::warn;

pub async fn cmd_serve(config: &TaskboardConfig) -> Result<()> {
    for warning in config.validate() {
        warn!("{}", warning);
    }
    start_server(ServerConfig::from(config)).await
}
