//! The adapter factory: detect-or-force selection of the adapter family.

use crate::{
    anvil::AnvilAdapter, errors::AdapterError, evm::EvmAdapter, stableone::StableOneAdapter,
    traits::ChainAdapter,
};
use quarry_primitives::{ChainFamily, ChainInfo, NodeFamily};
use quarry_rpc::{client::DEFAULT_RPC_TIMEOUT, NodeDetector, RpcClient};
use reqwest::Url;
use std::{sync::Arc, time::Duration};
use tracing::info;

/// Parameters for adapter construction.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Skip detection and force this family.
    pub forced: Option<ChainFamily>,
    /// Per-call RPC deadline.
    pub rpc_timeout: Duration,
    /// Consensus epoch length override; `None` selects family defaults.
    pub epoch_length: Option<u64>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self { forced: None, rpc_timeout: DEFAULT_RPC_TIMEOUT, epoch_length: None }
    }
}

/// Connects to an endpoint and builds the matching adapter.
pub async fn build_adapter(
    endpoint: Url,
    config: &AdapterConfig,
) -> Result<Arc<dyn ChainAdapter>, AdapterError> {
    let client = Arc::new(RpcClient::new_http(endpoint, config.rpc_timeout));
    build_adapter_with_client(client, config).await
}

/// Builds the matching adapter over an existing client.
///
/// With a forced family the detection call is skipped, but the capability
/// flags are still probed opportunistically for observability.
pub async fn build_adapter_with_client(
    client: Arc<RpcClient>,
    config: &AdapterConfig,
) -> Result<Arc<dyn ChainAdapter>, AdapterError> {
    let detector = NodeDetector::new(Arc::clone(&client));
    let (family, chain_id, name) = match config.forced {
        Some(forced) => {
            let chain_id = client.chain_id().await?;
            let (anvil, debug, pending) = detector.probe_capabilities().await;
            info!(
                target: "factory",
                %forced, chain_id, anvil, debug, pending,
                "adapter family forced, capabilities probed"
            );
            (forced, chain_id, forced.to_string())
        }
        None => {
            let node = detector.detect().await?;
            let family = match node.family {
                NodeFamily::Anvil => ChainFamily::Anvil,
                NodeFamily::StableOne => ChainFamily::StableOne,
                // Geth, Hardhat, Ganache, and anything unknown all speak
                // plain EVM.
                _ => ChainFamily::Evm,
            };
            let name = format!("{:?}", node.family).to_lowercase();
            info!(
                target: "factory",
                %family, chain_id = node.chain_id, banner = %node.client_version,
                "adapter family detected"
            );
            (family, node.chain_id, name)
        }
    };

    let mut chain_info = ChainInfo::new(chain_id, family, name);
    let epoch_length = config.epoch_length.unwrap_or(0);
    Ok(match family {
        ChainFamily::Evm => Arc::new(EvmAdapter::new(chain_info, client)),
        ChainFamily::Anvil => {
            chain_info.consensus = Some("clique".to_string());
            Arc::new(AnvilAdapter::new(chain_info, client))
        }
        ChainFamily::StableOne => {
            chain_info.consensus = Some("wbft".to_string());
            Arc::new(StableOneAdapter::new(chain_info, client, epoch_length))
        }
    })
}
