//! Safe decoder service.
//!
//! Wires the metadata acquisition pipeline (event consumer → task queue →
//! explorer pool → store/cache) to the calldata decoding registry. The HTTP
//! routing layer lives outside this crate and consumes [`AppContext`].

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use anyhow::Context;
use redis::aio::ConnectionManager;
use sqlx::PgPool;

pub mod broker;
pub mod cache;
pub mod config;
pub mod queue;
pub mod services;
pub mod utils;
pub mod worker;

use cache::ServiceCache;
use config::Settings;
use queue::TaskQueue;
use services::contract::ContractService;
use services::contract_metadata::{ContractMetadataService, ExplorerRegistry};
use services::data_decoder::DataDecoderService;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a collaborator (HTTP router, CLI command, worker) needs,
/// built once at startup and passed by value instead of living in ambient
/// singletons.
pub struct AppContext {
    pub settings: Settings,
    pub pool: PgPool,
    pub cache: ServiceCache,
    pub queue: TaskQueue,
    pub contract_metadata: Arc<ContractMetadataService>,
    pub contracts: Arc<ContractService>,
    pub data_decoder: Arc<DataDecoderService>,
}

impl AppContext {
    /// Connect the datasources, apply migrations and assemble the services.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let pool = decoder_db::connect(&settings.database_url, settings.database_pool_size)
            .await
            .context("cannot connect to the database")?;
        decoder_db::run_migrations(&pool).await.context("cannot apply migrations")?;

        let redis_client = redis::Client::open(settings.redis_url.as_str())
            .context("invalid REDIS_URL")?;
        let redis = ConnectionManager::new(redis_client)
            .await
            .context("cannot connect to redis")?;

        let cache = ServiceCache::new(redis.clone());
        let queue = TaskQueue::new(redis);
        let contract_metadata = Arc::new(ContractMetadataService::new(
            pool.clone(),
            cache.clone(),
            queue.clone(),
            ExplorerRegistry::new(settings.pool_config()),
            settings.contract_max_download_retries,
        ));
        let contracts = Arc::new(ContractService::new(
            pool.clone(),
            cache.clone(),
            settings.contract_logo_base_url.clone(),
        ));
        let data_decoder = Arc::new(
            DataDecoderService::new(pool.clone())
                .await
                .context("cannot initialize the decoding registry")?,
        );

        Ok(Self { settings, pool, cache, queue, contract_metadata, contracts, data_decoder })
    }
}
