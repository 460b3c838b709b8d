// Standard library imports
use std::path::PathBuf;

// Third party imports
use anyhow::{Context, Result};
use tracing::{info, warn};

// Internal imports
use nodeweave_blockchain::{BlockTarget, EvmNodeInquirer, InquirerSettings};
use nodeweave_common::init_logging;

/// Kết nối tới các node trong cấu hình rồi in block mới nhất và năng lực từng node
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = InquirerSettings::load(config_path.as_deref()).context("Không tải được cấu hình")?;
    let _guard = init_logging(&settings.log).context("Không khởi tạo được logging")?;

    info!("Khởi động probe cho chain {}", settings.chain);
    let inquirer = EvmNodeInquirer::from_settings(&settings)?;
    inquirer.connect_to_multiple_nodes(&settings.nodes);
    inquirer.wait_for_pending_connections().await;

    for node in inquirer.get_connected_nodes() {
        if let Some(connection) = inquirer.connections().get_connection(&node.name) {
            info!(
                "{} at {}: archive={} pruned={} owned={}",
                node, node.endpoint, connection.is_archive, connection.is_pruned, node.owned
            );
        }
    }
    if !inquirer.connected_to_any_node() {
        warn!("Không kết nối được node nào, chỉ dùng indexer");
    }

    let latest = inquirer.get_latest_block_number(None).await?;
    let block = inquirer.get_block_by_number(BlockTarget::Number(latest), None).await?;
    info!("Latest {} block {} at timestamp {}", settings.chain, block.number, block.timestamp);
    Ok(())
}
