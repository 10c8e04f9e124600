//! Orchestration of the metadata acquisition pipeline: "make sure the
//! metadata for `(address, chain_id)` is either known or its retry budget
//! decremented".
//!
//! Every step is idempotent (content-addressed ABIs, `get_or_create` rows,
//! monotone retry counters), so at-least-once task delivery is safe.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use decoder_core::Address;
use decoder_db::{Abi, AbiSource, Contract};
use decoder_explorers::{EnhancedContractMetadata, ExplorerPool, PoolConfig};
use sqlx::PgPool;

use crate::cache::ServiceCache;
use crate::queue::{Task, TaskQueue};

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Queue(#[from] redis::RedisError),
}

/// Lazily built, shared explorer pools, one per chain.
pub struct ExplorerRegistry {
    config: PoolConfig,
    pools: Mutex<HashMap<u64, Arc<ExplorerPool>>>,
}

impl ExplorerRegistry {
    pub fn new(config: PoolConfig) -> Self {
        Self { config, pools: Mutex::new(HashMap::new()) }
    }

    pub async fn pool(&self, chain_id: u64) -> Arc<ExplorerPool> {
        let mut pools = self.pools.lock().await;
        pools
            .entry(chain_id)
            .or_insert_with(|| Arc::new(ExplorerPool::new(chain_id, &self.config)))
            .clone()
    }
}

pub struct ContractMetadataService {
    pool: PgPool,
    cache: ServiceCache,
    queue: TaskQueue,
    explorers: ExplorerRegistry,
    max_retries: i32,
}

impl ContractMetadataService {
    pub fn new(
        pool: PgPool,
        cache: ServiceCache,
        queue: TaskQueue,
        explorers: ExplorerRegistry,
        max_retries: i32,
    ) -> Self {
        Self { pool, cache, queue, explorers, max_retries }
    }

    /// The full pipeline step run by the task worker.
    pub async fn process(
        &self,
        address: Address,
        chain_id: u64,
        skip_attempt_check: bool,
    ) -> Result<bool, MetadataError> {
        if !skip_attempt_check && !self.should_attempt_download(address, chain_id).await? {
            debug!(
                target: "contract_metadata",
                address = ?address,
                chain_id,
                "skipping download, budget exhausted or ABI known"
            );
            return Ok(false);
        }

        let enhanced = self.get_contract_metadata(address, chain_id).await;
        self.process_enhanced(enhanced).await
    }

    /// Gate on the negative-attempt cache, falling through to the store: a
    /// contract whose budget is exhausted or whose ABI is already known is
    /// marked and never downloaded again.
    pub async fn should_attempt_download(
        &self,
        address: Address,
        chain_id: u64,
    ) -> Result<bool, MetadataError> {
        if !self
            .cache
            .should_attempt_download(&address, chain_id, self.max_retries)
            .await
        {
            return Ok(false);
        }
        if let Some(contract) =
            Contract::get(&self.pool, address.as_bytes(), chain_id as i64).await?
        {
            if contract.fetch_retries > self.max_retries || contract.abi_id.is_some() {
                self.cache
                    .mark_should_not_attempt(&address, chain_id, self.max_retries)
                    .await;
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Query the chain's explorer pool.
    pub async fn get_contract_metadata(
        &self,
        address: Address,
        chain_id: u64,
    ) -> EnhancedContractMetadata {
        self.explorers.pool(chain_id).await.get_contract_metadata(address).await
    }

    /// Persist a pool result and schedule the proxy implementation download
    /// when one was discovered. Returns whether metadata was found.
    pub async fn process_enhanced(
        &self,
        enhanced: EnhancedContractMetadata,
    ) -> Result<bool, MetadataError> {
        let found = self.process_contract_metadata(&enhanced).await?;

        if let Some(implementation) = Self::proxy_implementation_address(&enhanced) {
            info!(
                target: "contract_metadata",
                address = ?enhanced.address,
                implementation = ?implementation,
                "scheduling proxy implementation download"
            );
            self.queue
                .enqueue(Task::ProcessContractMetadata {
                    address: format!("{implementation:?}"),
                    chain_id: enhanced.chain_id,
                    skip_attempt_check: false,
                })
                .await?;
        }
        Ok(found)
    }

    /// Persist one pool result: create the contract row, attach the ABI
    /// under the winning provider's source, bump the retry counter and drop
    /// the cached responses for the address.
    pub async fn process_contract_metadata(
        &self,
        enhanced: &EnhancedContractMetadata,
    ) -> Result<bool, MetadataError> {
        let (mut contract, _) = Contract::get_or_create(
            &self.pool,
            enhanced.address.as_bytes(),
            enhanced.chain_id as i64,
        )
        .await?;

        if let (Some(metadata), Some(source)) = (&enhanced.metadata, enhanced.source) {
            let (source_row, _) =
                AbiSource::get_or_create(&self.pool, source.name(), source.url()).await?;
            let (abi, _) = Abi::get_or_create(&self.pool, &metadata.abi, source_row.id, 0).await?;
            contract.abi_id = Some(abi.id);
            if !metadata.name.is_empty() {
                contract.name = Some(metadata.name.clone());
            }
            contract.implementation =
                metadata.implementation.map(|implementation| implementation.as_bytes().to_vec());
            info!(
                target: "contract_metadata",
                address = ?enhanced.address,
                chain_id = enhanced.chain_id,
                source = source.name(),
                "stored contract metadata"
            );
        }

        contract.fetch_retries += 1;
        contract.save(&self.pool).await?;
        self.cache.invalidate_contract(&enhanced.address).await;

        Ok(enhanced.metadata.is_some())
    }

    /// The delegate-call target a pool result points at, if any.
    pub fn proxy_implementation_address(
        enhanced: &EnhancedContractMetadata,
    ) -> Option<Address> {
        enhanced.metadata.as_ref().and_then(|metadata| metadata.implementation)
    }
}
