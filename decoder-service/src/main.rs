use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use decoder_core::utils::parse_address;
use decoder_service::broker::QueueProvider;
use decoder_service::config::Settings;
use decoder_service::services::events::EventsService;
use decoder_service::services::{abis, safe_contracts};
use decoder_service::worker::{Scheduler, TaskWorker};
use decoder_service::AppContext;

/// Workers draining the task queue in one process.
const WORKER_COUNT: usize = 4;

#[derive(Parser)]
#[command(name = "decoder-service", version, about = "Safe contract-metadata decoding service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the service: consumer, workers and scheduler.
    Run,
    /// Download the metadata of a single contract and exit.
    DownloadContract {
        /// `0x`-prefixed contract address.
        address: String,
        #[arg(long)]
        chain_id: u64,
    },
    /// Store the embedded ABIs in the database and exit.
    LoadAbis,
    /// Publish a sample execution event on the exchange and exit.
    PublishTestEvent {
        /// `0x`-prefixed checksummed contract address.
        address: String,
        #[arg(long, default_value_t = 1)]
        chain_id: u64,
        /// `0x`-prefixed calldata, omitted from the event when unset.
        #[arg(long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let settings = Settings::from_env();
    match Cli::parse().command.unwrap_or(Command::Run) {
        Command::Run => run(settings).await,
        Command::DownloadContract { address, chain_id } => {
            download_contract(settings, &address, chain_id).await
        }
        Command::LoadAbis => load_abis(settings).await,
        Command::PublishTestEvent { address, chain_id, data } => {
            publish_test_event(settings, &address, chain_id, data).await
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    info!(version = decoder_service::VERSION, "starting decoder service");
    let context = AppContext::build(settings).await?;

    abis::load_local_abis(&context.pool).await?;
    if let Err(err) = safe_contracts::update_safe_contracts_info(
        &context.pool,
        &context.settings.contracts_trusted_for_delegate_call,
    )
    .await
    {
        warn!(%err, "cannot update well-known contracts on startup");
    }

    let recovered = context.queue.recover_stranded().await?;
    if recovered > 0 {
        info!(recovered, "requeued stranded tasks");
    }

    // the consumer is optional: without a broker the periodic rescans still
    // keep the data moving
    let mut consumer_task = None;
    let mut provider = None;
    match QueueProvider::connect(&context.settings).await {
        Ok(connected) => {
            let events = Arc::new(EventsService::new(context.queue.clone()));
            consumer_task = Some(connected.consume(events).await?);
            provider = Some(connected);
        }
        Err(err) => error!(%err, "unable to connect to the queue provider"),
    }

    let mut workers = Vec::with_capacity(WORKER_COUNT);
    for _ in 0..WORKER_COUNT {
        let worker = TaskWorker::new(
            context.queue.clone(),
            context.pool.clone(),
            context.contract_metadata.clone(),
            context.settings.contracts_trusted_for_delegate_call.clone(),
        );
        workers.push(tokio::spawn(worker.run()));
    }
    let scheduler = Scheduler::new(
        context.queue.clone(),
        context.pool.clone(),
        context.settings.contract_max_download_retries,
    );
    let scheduler_task = tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c().await.context("cannot listen for shutdown")?;
    info!("shutting down");

    if let Some(task) = consumer_task {
        task.abort();
    }
    if let Some(provider) = provider {
        if let Err(err) = provider.disconnect().await {
            warn!(%err, "cannot disconnect from the queue provider");
        }
    }
    scheduler_task.abort();
    for worker in workers {
        worker.abort();
    }
    Ok(())
}

async fn download_contract(settings: Settings, address: &str, chain_id: u64) -> anyhow::Result<()> {
    let address = parse_address(address).context("invalid contract address")?;
    let context = AppContext::build(settings).await?;

    if let Some(contract) =
        decoder_db::Contract::get(&context.pool, address.as_bytes(), chain_id as i64).await?
    {
        println!(
            "Contract: {address:?}, retries: {}, contains ABI: {}",
            contract.fetch_retries,
            contract.abi_id.is_some()
        );
    } else {
        println!("Contract {address:?} was never retrieved");
    }

    let enhanced = context.contract_metadata.get_contract_metadata(address, chain_id).await;
    let implementation =
        decoder_service::services::contract_metadata::ContractMetadataService::proxy_implementation_address(&enhanced);
    if context.contract_metadata.process_enhanced(enhanced).await? {
        println!("Success downloading contract metadata");
        if let Some(implementation) = implementation {
            println!("The contract is a proxy of {implementation:?}, implementation download was enqueued");
        }
    } else {
        println!("Failed to download contract metadata");
    }
    Ok(())
}

async fn load_abis(settings: Settings) -> anyhow::Result<()> {
    let pool = decoder_db::connect(&settings.database_url, settings.database_pool_size).await?;
    decoder_db::run_migrations(&pool).await?;
    let created = abis::load_local_abis(&pool).await?;
    println!("Stored {created} new ABIs");
    Ok(())
}

async fn publish_test_event(
    settings: Settings,
    address: &str,
    chain_id: u64,
    data: Option<String>,
) -> anyhow::Result<()> {
    let event = serde_json::json!({
        "type": "EXECUTED_MULTISIG_TRANSACTION",
        "chainId": chain_id.to_string(),
        "to": address,
        "data": data,
    });
    let provider = QueueProvider::connect(&settings).await?;
    provider.publish(event.to_string().as_bytes()).await?;
    println!("Published: {event}");
    provider.close().await?;
    Ok(())
}
