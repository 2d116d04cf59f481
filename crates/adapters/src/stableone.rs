//! The StableOne adapter: generic EVM plus WBFT consensus and the system
//! contract table.

use crate::{
    consensus::{ConsensusParser, WbftParser},
    evm::EvmAdapter,
    system::SystemContractsHandler,
    traits::ChainAdapter,
    tx_parser::TransactionParser,
};
use async_trait::async_trait;
use quarry_primitives::{BlockSource, ChainInfo};
use quarry_rpc::RpcClient;
use std::sync::Arc;

/// Adapter for StableOne networks.
#[derive(Debug)]
pub struct StableOneAdapter {
    evm: EvmAdapter,
    consensus: Arc<dyn ConsensusParser>,
    system: Arc<SystemContractsHandler>,
}

impl StableOneAdapter {
    /// Creates an adapter over the given client; `epoch_length == 0` selects
    /// the WBFT default.
    pub fn new(info: ChainInfo, client: Arc<RpcClient>, epoch_length: u64) -> Self {
        Self {
            evm: EvmAdapter::new(info, client),
            consensus: Arc::new(WbftParser::new(epoch_length)),
            system: Arc::new(SystemContractsHandler::stableone()),
        }
    }
}

#[async_trait]
impl ChainAdapter for StableOneAdapter {
    fn info(&self) -> &ChainInfo {
        self.evm.info()
    }

    fn block_fetcher(&self) -> Arc<dyn BlockSource> {
        self.evm.block_fetcher()
    }

    fn transaction_parser(&self) -> Arc<TransactionParser> {
        self.evm.transaction_parser()
    }

    fn consensus_parser(&self) -> Option<Arc<dyn ConsensusParser>> {
        Some(Arc::clone(&self.consensus))
    }

    fn system_contracts(&self) -> Option<Arc<SystemContractsHandler>> {
        Some(Arc::clone(&self.system))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quarry_primitives::ChainFamily;
    use quarry_rpc::client::DEFAULT_RPC_TIMEOUT;

    #[test]
    fn capabilities_are_present() {
        let client = Arc::new(RpcClient::new_http(
            "http://localhost:8545".parse().unwrap(),
            DEFAULT_RPC_TIMEOUT,
        ));
        let mut info = ChainInfo::new(9999, ChainFamily::StableOne, "stableone-local");
        info.consensus = Some("wbft".to_string());
        let adapter = StableOneAdapter::new(info, client, 0);

        assert!(adapter.consensus_parser().is_some());
        assert!(adapter.system_contracts().is_some());
        assert_eq!(adapter.consensus_parser().unwrap().consensus_type(), "wbft");
        assert_eq!(adapter.info().family, ChainFamily::StableOne);
    }
}
