//! Sourcify client.
//!
//! Sourcify serves verified contract metadata for every chain it indexes
//! from one endpoint; verification is checked first, then the
//! `metadata.json` of the (full or partial) match is fetched.

use crate::{ContractMetadata, ExplorerError, Result};
use decoder_core::Address;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::trace;

const SOURCIFY_SERVER_URL: &str = "https://sourcify.dev/server/";

/// The Sourcify API client.
#[derive(Clone, Debug)]
pub struct SourcifyClient {
    client: reqwest::Client,
    base_url: Url,
    chain_id: u64,
    limiter: Arc<Semaphore>,
}

impl SourcifyClient {
    pub fn new(chain_id: u64, max_requests: usize, timeout: Duration) -> Result<Self> {
        if chain_id == 0 {
            return Err(ExplorerError::ChainNotSupported(chain_id));
        }
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: Url::parse(SOURCIFY_SERVER_URL)?,
            chain_id,
            limiter: Arc::new(Semaphore::new(max_requests.max(1))),
        })
    }

    /// Fetch contract metadata. `Ok(None)` when Sourcify has no match for
    /// the address on this chain.
    pub async fn contract_metadata(&self, address: Address) -> Result<Option<ContractMetadata>> {
        let Some(partial_match) = self.check_verified(address).await? else {
            return Ok(None);
        };
        let Some(files) = self.files_any(address).await? else {
            return Ok(None);
        };
        let Some(metadata) = files
            .files
            .iter()
            .find(|file| file.name == "metadata.json")
            .map(|file| serde_json::from_str::<MetadataJson>(&file.content))
            .transpose()?
        else {
            return Ok(None);
        };

        // the compilation target maps the source path to the contract name
        let name = metadata
            .settings
            .compilation_target
            .values()
            .next()
            .cloned()
            .unwrap_or_default();
        Ok(Some(ContractMetadata {
            name,
            abi: metadata.output.abi,
            implementation: None,
            partial_match,
        }))
    }

    /// Returns `Some(partial_match)` when the address is verified.
    async fn check_verified(&self, address: Address) -> Result<Option<bool>> {
        let url = self.base_url.join("check-all-by-addresses")?;
        let _permit = self.limiter.acquire().await.expect("limiter never closed");
        trace!(target: "explorers::sourcify", "GET {url}");
        let response = self
            .client
            .get(url)
            .query(&[
                ("addresses", format!("{address:?}")),
                ("chainIds", self.chain_id.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let entries: Vec<CheckEntry> = response.json().await?;

        for entry in entries {
            for chain in entry.chain_ids {
                if chain.chain_id == self.chain_id.to_string() {
                    return Ok(Some(chain.status == "partial"));
                }
            }
        }
        Ok(None)
    }

    async fn files_any(&self, address: Address) -> Result<Option<FilesResponse>> {
        let url = self
            .base_url
            .join(&format!("files/any/{}/{address:?}", self.chain_id))?;
        let _permit = self.limiter.acquire().await.expect("limiter never closed");
        trace!(target: "explorers::sourcify", "GET {url}");
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }
}

#[derive(Debug, Deserialize)]
struct CheckEntry {
    #[allow(dead_code)]
    address: String,
    #[serde(rename = "chainIds", default)]
    chain_ids: Vec<CheckChain>,
}

#[derive(Debug, Deserialize)]
struct CheckChain {
    #[serde(rename = "chainId")]
    chain_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[allow(dead_code)]
    #[serde(default)]
    status: Option<String>,
    files: Vec<SourceFile>,
}

#[derive(Debug, Deserialize)]
struct SourceFile {
    name: String,
    content: String,
}

/// The parts of Sourcify's `metadata.json` the service consumes.
#[derive(Debug, Deserialize)]
struct MetadataJson {
    output: MetadataOutput,
    settings: MetadataSettings,
}

#[derive(Debug, Deserialize)]
struct MetadataOutput {
    abi: Value,
}

#[derive(Debug, Deserialize)]
struct MetadataSettings {
    #[serde(rename = "compilationTarget", default)]
    compilation_target: std::collections::BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_response() {
        let body = r#"[{"address":"0xd9Db270c1B5E3Bd161E8c8503c55cEABeE709552",
            "chainIds":[{"chainId":"1","status":"perfect"},{"chainId":"100","status":"partial"}]}]"#;
        let entries: Vec<CheckEntry> = serde_json::from_str(body).unwrap();
        assert_eq!(entries[0].chain_ids.len(), 2);
        assert_eq!(entries[0].chain_ids[1].status, "partial");
    }

    #[test]
    fn unverified_check_has_no_chains() {
        let body = r#"[{"address":"0xd9Db270c1B5E3Bd161E8c8503c55cEABeE709552","status":"false"}]"#;
        let entries: Vec<CheckEntry> = serde_json::from_str(body).unwrap();
        assert!(entries[0].chain_ids.is_empty());
    }

    #[test]
    fn parses_metadata_json() {
        let body = r#"{"status":"full","files":[
            {"name":"metadata.json","path":"/contracts/...","content":
             "{\"output\":{\"abi\":[{\"name\":\"ping\",\"type\":\"function\",\"inputs\":[],\"outputs\":[]}]},\"settings\":{\"compilationTarget\":{\"contracts/Ping.sol\":\"Ping\"}}}"}]}"#;
        let files: FilesResponse = serde_json::from_str(body).unwrap();
        let metadata: MetadataJson =
            serde_json::from_str(&files.files[0].content).unwrap();
        assert_eq!(
            metadata.settings.compilation_target.values().next().unwrap(),
            "Ping"
        );
        assert!(metadata.output.abi.is_array());
    }
}
