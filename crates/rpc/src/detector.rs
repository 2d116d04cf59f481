//! Node detection: classify the peer behind an RPC endpoint.

use crate::{client::RpcClient, errors::is_method_not_found, RpcClientError};
use quarry_primitives::{NodeFamily, NodeInfo};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Chain ids conventionally used by local development nodes.
const LOCAL_CHAIN_IDS: [u64; 5] = [31337, 1337, 1338, 1234, 9999];

/// Probes an endpoint and classifies the node family behind it.
#[derive(Debug)]
pub struct NodeDetector {
    client: Arc<RpcClient>,
}

impl NodeDetector {
    /// Creates a detector over the given client.
    pub const fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    /// Runs the full probe sequence.
    ///
    /// `web3_clientVersion` and `eth_chainId` are required; the vendor
    /// probes are opportunistic. A successful Anvil probe upgrades the
    /// classification regardless of what the banner said.
    pub async fn detect(&self) -> Result<NodeInfo, RpcClientError> {
        let client_version = self.client.client_version().await?;
        let mut family = classify_banner(&client_version);
        let chain_id = self.client.chain_id().await?;
        let is_local = LOCAL_CHAIN_IDS.contains(&chain_id);

        let supports_anvil = self.probe_anvil().await;
        if supports_anvil {
            family = NodeFamily::Anvil;
        }
        let supports_debug = self.probe_debug().await;
        let supports_pending_tx = self.probe_pending_filter().await;

        let info = NodeInfo {
            family,
            client_version,
            chain_id,
            is_local,
            supports_pending_tx,
            supports_debug,
            supports_anvil,
        };
        debug!(target: "detector", ?info, "node probe complete");
        Ok(info)
    }

    /// Probes only the `supports_*` capability flags, for forced-adapter
    /// setups that skip full detection.
    pub async fn probe_capabilities(&self) -> (bool, bool, bool) {
        (
            self.probe_anvil().await,
            self.probe_debug().await,
            self.probe_pending_filter().await,
        )
    }

    async fn probe_anvil(&self) -> bool {
        if self.client.raw("anvil_nodeInfo", json!([])).await.is_ok() {
            return true;
        }
        self.client.raw("anvil_getAutomine", json!([])).await.is_ok()
    }

    async fn probe_debug(&self) -> bool {
        // Any reply other than "method not found / not supported" means the
        // namespace exists, including errors about the traced block itself.
        match self.client.raw("debug_traceBlockByNumber", json!(["0x0", {}])).await {
            Ok(_) => true,
            Err(RpcClientError::Transport(ref err)) => !is_method_not_found(err),
            Err(_) => false,
        }
    }

    async fn probe_pending_filter(&self) -> bool {
        match self.client.raw("eth_newPendingTransactionFilter", json!([])).await {
            Ok(filter_id) => {
                let _ = self.client.raw("eth_uninstallFilter", json!([filter_id])).await;
                true
            }
            Err(_) => false,
        }
    }
}

/// Pattern-matches the `web3_clientVersion` banner against the known
/// families, case-insensitively.
pub fn classify_banner(banner: &str) -> NodeFamily {
    let banner = banner.to_lowercase();
    if banner.contains("anvil") || banner.contains("foundry-anvil") {
        NodeFamily::Anvil
    } else if banner.contains("stableone") || banner.contains("go-stablenet") {
        NodeFamily::StableOne
    } else if banner.contains("hardhat") || banner.contains("hardhatnetwork") {
        NodeFamily::Hardhat
    } else if banner.contains("ganache") || banner.contains("ethereumjs testrpc") {
        NodeFamily::Ganache
    } else if banner.contains("geth") || banner.contains("go-ethereum") {
        NodeFamily::Geth
    } else {
        NodeFamily::Unknown
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn banner_classification_matches_known_families() {
        let cases = [
            ("anvil/v0.2.0", NodeFamily::Anvil),
            ("foundry-anvil/v1.0", NodeFamily::Anvil),
            ("Geth/v1.13.14-stable/linux-amd64/go1.21", NodeFamily::Geth),
            ("go-ethereum/v1.10", NodeFamily::Geth),
            ("StableOne/v2.1.0", NodeFamily::StableOne),
            ("go-stablenet/v0.9", NodeFamily::StableOne),
            ("HardhatNetwork/2.22.1", NodeFamily::Hardhat),
            ("hardhat/2.0", NodeFamily::Hardhat),
            ("Ganache/v7.9.2", NodeFamily::Ganache),
            ("EthereumJS TestRPC/v2.13", NodeFamily::Ganache),
            ("reth/v1.0.0", NodeFamily::Unknown),
        ];
        for (banner, family) in cases {
            assert_eq!(classify_banner(banner), family, "banner {banner:?}");
        }
    }

    #[test]
    fn local_chain_id_set() {
        for id in LOCAL_CHAIN_IDS {
            assert!(LOCAL_CHAIN_IDS.contains(&id));
        }
        assert!(!LOCAL_CHAIN_IDS.contains(&1));
    }
}
