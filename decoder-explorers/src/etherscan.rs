//! Etherscan v2 API client.
//!
//! The v2 API serves every supported chain from a single endpoint and routes
//! by the `chainid` query parameter.

use crate::{ContractMetadata, ExplorerError, Result};
use decoder_core::{utils::parse_address, Address};
use reqwest::{header, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{borrow::Cow, collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{error, trace};

const ETHERSCAN_V2_API_URL: &str = "https://api.etherscan.io/v2/api";

/// The Etherscan API client.
#[derive(Clone, Debug)]
pub struct EtherscanClient {
    /// Client that executes HTTP requests
    client: reqwest::Client,
    /// Etherscan API key
    api_key: Option<String>,
    /// Etherscan v2 API endpoint
    api_url: Url,
    /// Chain routed to via the `chainid` parameter
    chain_id: u64,
    /// Caps concurrent in-flight requests
    limiter: Arc<Semaphore>,
}

impl EtherscanClient {
    /// Create a client for the given chain.
    ///
    /// # Errors
    ///
    /// Fails for the zero chain id, which Etherscan cannot route.
    pub fn new(
        chain_id: u64,
        api_key: impl Into<String>,
        max_requests: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if chain_id == 0 {
            return Err(ExplorerError::ChainNotSupported(chain_id));
        }
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_key: Some(api_key.into()).filter(|s: &String| !s.is_empty()),
            api_url: Url::parse(ETHERSCAN_V2_API_URL)?,
            chain_id,
            limiter: Arc::new(Semaphore::new(max_requests.max(1))),
        })
    }

    /// Fetch the verified source metadata for a contract. `Ok(None)` means
    /// the contract is not verified on this chain.
    pub async fn contract_metadata(&self, address: Address) -> Result<Option<ContractMetadata>> {
        let query = self.create_query(
            "contract",
            "getsourcecode",
            HashMap::from([("address", format!("{address:?}"))]),
        );
        let response: Response<Vec<SourceCodeEntry>> = self.get_json(&query).await?;

        let Some(entry) = response.result.into_iter().next() else {
            return Ok(None);
        };
        if entry.abi.starts_with("Contract source code not verified") {
            return Ok(None);
        }
        let abi: Value = serde_json::from_str(&entry.abi)?;
        let implementation = entry
            .implementation
            .as_deref()
            .filter(|_| entry.proxy == "1")
            .and_then(parse_address)
            .filter(|impl_address| *impl_address != address);

        Ok(Some(ContractMetadata {
            name: entry.contract_name,
            abi,
            implementation,
            partial_match: false,
        }))
    }

    /// Execute a GET request with parameters and sanity check the response.
    async fn get_json<T: DeserializeOwned, Q: Serialize>(&self, query: &Q) -> Result<Response<T>> {
        let _permit = self.limiter.acquire().await.expect("limiter never closed");
        trace!(target: "explorers::etherscan", "GET {}", self.api_url);
        let response = self
            .client
            .get(self.api_url.clone())
            .header(header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?
            .text()
            .await?;
        sanitize_response(&response)
    }

    fn create_query<T: Serialize>(
        &self,
        module: &'static str,
        action: &'static str,
        other: T,
    ) -> Query<T> {
        Query {
            apikey: self.api_key.as_deref().map(Cow::Borrowed),
            chainid: self.chain_id,
            module: Cow::Borrowed(module),
            action: Cow::Borrowed(action),
            other,
        }
    }
}

/// Perform sanity checks on a response and deserialize it into a [`Response`].
fn sanitize_response<T: DeserializeOwned>(res: &str) -> Result<Response<T>> {
    let res: ResponseData<T> = serde_json::from_str(res).map_err(|err| {
        error!(target: "explorers::etherscan", ?res, "failed to deserialize response: {}", err);
        ExplorerError::Serde(err)
    })?;

    match res {
        ResponseData::Error { status, message, result } => {
            if let Some(ref result) = result {
                if result.starts_with("Max rate limit reached") {
                    return Err(ExplorerError::RateLimitExceeded);
                }
            }
            Err(ExplorerError::ErrorResponse { status, message, result })
        }
        ResponseData::Success(res) => Ok(res),
    }
}

/// The API response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Response<T> {
    pub status: String,
    pub message: String,
    pub result: T,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum ResponseData<T> {
    Success(Response<T>),
    Error { status: String, message: String, result: Option<String> },
}

/// The type that gets serialized as query.
#[derive(Clone, Debug, Serialize)]
struct Query<'a, T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    apikey: Option<Cow<'a, str>>,
    chainid: u64,
    module: Cow<'a, str>,
    action: Cow<'a, str>,
    #[serde(flatten)]
    other: T,
}

/// One entry of a `getsourcecode` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SourceCodeEntry {
    contract_name: String,
    #[serde(rename = "ABI")]
    abi: String,
    #[serde(default)]
    proxy: String,
    #[serde(default)]
    implementation: Option<String>,
}
