//! Blockscout v2 REST client.
//!
//! Blockscout runs one instance per chain, so the client carries a chain →
//! instance table and construction fails for chains without a known
//! instance; those are simply omitted from the failover list.

use crate::{ContractMetadata, ExplorerError, Result};
use decoder_core::{utils::parse_address, Address};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::trace;

/// Base URL of the Blockscout instance indexing the given chain.
pub fn instance_url(chain_id: u64) -> Option<&'static str> {
    let url = match chain_id {
        1 => "https://eth.blockscout.com",
        10 => "https://optimism.blockscout.com",
        100 => "https://gnosis.blockscout.com",
        137 => "https://polygon.blockscout.com",
        324 => "https://zksync.blockscout.com",
        1101 => "https://zkevm.blockscout.com",
        8453 => "https://base.blockscout.com",
        42161 => "https://arbitrum.blockscout.com",
        42220 => "https://explorer.celo.org/mainnet",
        11155111 => "https://eth-sepolia.blockscout.com",
        _ => return None,
    };
    Some(url)
}

/// The Blockscout API client.
#[derive(Clone, Debug)]
pub struct BlockscoutClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    limiter: Arc<Semaphore>,
}

impl BlockscoutClient {
    /// Create a client for the given chain.
    ///
    /// # Errors
    ///
    /// Fails when no Blockscout instance is known for the chain.
    pub fn new(
        chain_id: u64,
        api_key: impl Into<String>,
        max_requests: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let base = instance_url(chain_id)
            .ok_or(ExplorerError::ChainNotSupported(chain_id))?;
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: Url::parse(&format!("{base}/api/v2/"))?,
            api_key: Some(api_key.into()).filter(|s: &String| !s.is_empty()),
            limiter: Arc::new(Semaphore::new(max_requests.max(1))),
        })
    }

    /// Fetch the verified contract details. `Ok(None)` when the contract is
    /// unknown or not verified.
    pub async fn contract_metadata(&self, address: Address) -> Result<Option<ContractMetadata>> {
        let url = self.base_url.join(&format!("smart-contracts/{address:?}"))?;
        let _permit = self.limiter.acquire().await.expect("limiter never closed");
        trace!(target: "explorers::blockscout", "GET {url}");
        let mut request = self.client.get(url);
        if let Some(api_key) = &self.api_key {
            request = request.query(&[("apikey", api_key)]);
        }
        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let details: SmartContract = response.error_for_status()?.json().await?;
        Ok(metadata_from_details(address, details))
    }
}

fn metadata_from_details(
    address: Address,
    details: SmartContract,
) -> Option<ContractMetadata> {
    if !details.is_verified {
        return None;
    }
    let abi = details.abi?;
    let implementation = details
        .implementations
        .iter()
        .flatten()
        .filter_map(|implementation| parse_address(&implementation.address))
        .find(|impl_address| *impl_address != address);

    Some(ContractMetadata {
        name: details.name.unwrap_or_default(),
        abi,
        implementation,
        partial_match: !details.is_fully_verified.unwrap_or(true),
    })
}

/// `GET /api/v2/smart-contracts/{address}` response, reduced to the fields
/// the service consumes.
#[derive(Debug, Deserialize)]
struct SmartContract {
    #[serde(default)]
    is_verified: bool,
    is_fully_verified: Option<bool>,
    name: Option<String>,
    abi: Option<Value>,
    implementations: Option<Vec<Implementation>>,
}

#[derive(Debug, Deserialize)]
struct Implementation {
    address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knows_mainnet_instance() {
        assert_eq!(instance_url(1), Some("https://eth.blockscout.com"));
        assert_eq!(instance_url(31337), None);
    }

    #[test]
    fn unsupported_chain_is_config_error() {
        let err =
            BlockscoutClient::new(31337, "", 1, Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, ExplorerError::ChainNotSupported(31337)));
        assert!(!err.is_transient());
    }

    #[test]
    fn parses_verified_details() {
        let body = r#"{"is_verified":true,"is_fully_verified":true,"name":"Token",
            "abi":[{"name":"ping","type":"function","inputs":[],"outputs":[]}],
            "implementations":[]}"#;
        let details: SmartContract = serde_json::from_str(body).unwrap();
        let metadata =
            metadata_from_details(Address::zero(), details).unwrap();
        assert_eq!(metadata.name, "Token");
        assert!(!metadata.partial_match);
        assert!(metadata.implementation.is_none());
    }

    #[test]
    fn parses_proxy_details() {
        let body = r#"{"is_verified":true,"name":"Proxy","abi":[],
            "implementations":[{"address":"0x43506849d7c04f9138d1a2050bbf3a0c054402dd","name":"Impl"}]}"#;
        let details: SmartContract = serde_json::from_str(body).unwrap();
        let metadata = metadata_from_details(Address::zero(), details).unwrap();
        assert_eq!(
            metadata.implementation,
            parse_address("0x43506849d7c04f9138d1a2050bbf3a0c054402dd")
        );
    }

    #[test]
    fn unverified_details_are_none() {
        let body = r#"{"is_verified":false,"name":null,"abi":null}"#;
        let details: SmartContract = serde_json::from_str(body).unwrap();
        assert!(metadata_from_details(Address::zero(), details).is_none());
    }
}
