//! Block-explorer clients used to acquire contract metadata, and the pool
//! that runs them in failover order: Etherscan, then Sourcify, then
//! Blockscout. Every client carries its own concurrency limiter; transient
//! failures simply advance to the next provider.

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]

use decoder_core::Address;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub mod blockscout;
pub mod errors;
pub mod etherscan;
pub mod sourcify;

pub use blockscout::BlockscoutClient;
pub use errors::ExplorerError;
pub use etherscan::EtherscanClient;
pub use sourcify::SourcifyClient;

pub(crate) type Result<T, E = ExplorerError> = std::result::Result<T, E>;

/// Verified contract metadata as returned by a single explorer.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractMetadata {
    /// Contract name as reported by the explorer.
    pub name: String,
    /// ABI document, kept as an opaque JSON tree.
    pub abi: Value,
    /// Delegate-call target when the contract is a proxy.
    pub implementation: Option<Address>,
    /// Whether only a partial source match was verified.
    pub partial_match: bool,
}

/// Which explorer produced a metadata result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    Etherscan,
    Sourcify,
    Blockscout,
}

impl MetadataSource {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Etherscan => "Etherscan",
            Self::Sourcify => "Sourcify",
            Self::Blockscout => "Blockscout",
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            Self::Etherscan => "https://etherscan.io",
            Self::Sourcify => "https://sourcify.dev",
            Self::Blockscout => "https://blockscout.com",
        }
    }
}

/// Pool result: the requested coordinates plus whatever metadata was found
/// and the provider that won.
#[derive(Debug, Clone)]
pub struct EnhancedContractMetadata {
    pub address: Address,
    pub chain_id: u64,
    pub metadata: Option<ContractMetadata>,
    pub source: Option<MetadataSource>,
}

/// Construction parameters for a per-chain [`ExplorerPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub etherscan_api_key: String,
    pub etherscan_max_requests: usize,
    pub blockscout_api_key: String,
    pub blockscout_max_requests: usize,
    pub sourcify_max_requests: usize,
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            etherscan_api_key: String::new(),
            etherscan_max_requests: 1000,
            blockscout_api_key: String::new(),
            blockscout_max_requests: 1000,
            sourcify_max_requests: 2,
            request_timeout: Duration::from_secs(10),
        }
    }
}

enum ExplorerClient {
    Etherscan(EtherscanClient),
    Sourcify(SourcifyClient),
    Blockscout(BlockscoutClient),
}

impl ExplorerClient {
    fn source(&self) -> MetadataSource {
        match self {
            Self::Etherscan(_) => MetadataSource::Etherscan,
            Self::Sourcify(_) => MetadataSource::Sourcify,
            Self::Blockscout(_) => MetadataSource::Blockscout,
        }
    }

    async fn contract_metadata(&self, address: Address) -> Result<Option<ContractMetadata>> {
        match self {
            Self::Etherscan(client) => client.contract_metadata(address).await,
            Self::Sourcify(client) => client.contract_metadata(address).await,
            Self::Blockscout(client) => client.contract_metadata(address).await,
        }
    }
}

/// Ordered failover list of the explorers able to serve one chain.
pub struct ExplorerPool {
    chain_id: u64,
    clients: Vec<ExplorerClient>,
}

impl ExplorerPool {
    /// Build the pool for a chain. Providers that cannot be configured for
    /// the chain are left out with a single warning.
    pub fn new(chain_id: u64, config: &PoolConfig) -> Self {
        let mut clients = Vec::with_capacity(3);

        match EtherscanClient::new(
            chain_id,
            config.etherscan_api_key.clone(),
            config.etherscan_max_requests,
            config.request_timeout,
        ) {
            Ok(client) => clients.push(ExplorerClient::Etherscan(client)),
            Err(err) => {
                warn!(target: "explorers", chain_id, %err, "etherscan client is not available")
            }
        }
        match SourcifyClient::new(chain_id, config.sourcify_max_requests, config.request_timeout)
        {
            Ok(client) => clients.push(ExplorerClient::Sourcify(client)),
            Err(err) => {
                warn!(target: "explorers", chain_id, %err, "sourcify client is not available")
            }
        }
        match BlockscoutClient::new(
            chain_id,
            config.blockscout_api_key.clone(),
            config.blockscout_max_requests,
            config.request_timeout,
        ) {
            Ok(client) => clients.push(ExplorerClient::Blockscout(client)),
            Err(err) => {
                warn!(target: "explorers", chain_id, %err, "blockscout client is not available")
            }
        }

        Self { chain_id, clients }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Number of configured providers.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Query the providers in order and return the first non-empty metadata.
    /// Transient provider errors move on to the next provider.
    pub async fn get_contract_metadata(&self, address: Address) -> EnhancedContractMetadata {
        for client in &self.clients {
            match client.contract_metadata(address).await {
                Ok(Some(metadata)) => {
                    return EnhancedContractMetadata {
                        address,
                        chain_id: self.chain_id,
                        metadata: Some(metadata),
                        source: Some(client.source()),
                    }
                }
                Ok(None) => {}
                Err(err) if err.is_transient() => {
                    debug!(
                        target: "explorers",
                        address = ?address,
                        chain_id = self.chain_id,
                        source = client.source().name(),
                        %err,
                        "cannot get contract metadata"
                    );
                }
                Err(err) => {
                    warn!(
                        target: "explorers",
                        address = ?address,
                        chain_id = self.chain_id,
                        source = client.source().name(),
                        %err,
                        "explorer client failed"
                    );
                }
            }
        }

        EnhancedContractMetadata {
            address,
            chain_id: self.chain_id,
            metadata: None,
            source: None,
        }
    }
}
