//! Pipeline tests against live Postgres and Redis (explorer calls are
//! faked by handing the service pre-built pool results):
//!
//! ```sh
//! DATABASE_URL=... REDIS_URL=... cargo test -p decoder-service -- --ignored
//! ```

use decoder_core::utils::parse_address;
use decoder_db::{Abi, AbiSource, Contract};
use decoder_explorers::{ContractMetadata, EnhancedContractMetadata, MetadataSource};
use decoder_service::config::Settings;
use decoder_service::queue::TASKS_QUEUE;
use decoder_service::services::abis;
use decoder_service::AppContext;
use redis::AsyncCommands;
use serde_json::json;
use serial_test::serial;

const PROXY: &str = "0x1fA52E7B4a5d43dEbFcAE2A8cBc8Ce70cDC47532";
const IMPLEMENTATION: &str = "0x43506849D7C04F9138D1A2050bbF3A0c054402dd";

async fn test_context() -> AppContext {
    let settings = Settings::from_env();
    let context = AppContext::build(settings).await.expect("live services required");

    sqlx::query("TRUNCATE contract, abi, project RESTART IDENTITY CASCADE")
        .execute(&context.pool)
        .await
        .unwrap();
    let client = redis::Client::open(context.settings.redis_url.as_str()).unwrap();
    let mut redis = client.get_async_connection().await.unwrap();
    let _: () = redis.del(TASKS_QUEUE).await.unwrap();
    let _: () = redis
        .del(format!("{TASKS_QUEUE}.processing"))
        .await
        .unwrap();
    context
}

fn proxy_metadata() -> EnhancedContractMetadata {
    EnhancedContractMetadata {
        address: parse_address(PROXY).unwrap(),
        chain_id: 1,
        metadata: Some(ContractMetadata {
            name: "AdminUpgradeabilityProxy".into(),
            abi: json!([{"stateMutability":"payable","type":"fallback"}]),
            implementation: parse_address(IMPLEMENTATION),
            partial_match: false,
        }),
        source: Some(MetadataSource::Etherscan),
    }
}

#[tokio::test]
#[serial]
#[ignore = "needs live postgres and redis"]
async fn proxy_metadata_is_persisted_and_implementation_enqueued() {
    let context = test_context().await;
    let address = parse_address(PROXY).unwrap();

    let found = context.contract_metadata.process_enhanced(proxy_metadata()).await.unwrap();
    assert!(found);

    let contract = Contract::get(&context.pool, address.as_bytes(), 1).await.unwrap().unwrap();
    assert!(contract.abi_id.is_some());
    assert_eq!(contract.name.as_deref(), Some("AdminUpgradeabilityProxy"));
    assert_eq!(
        contract.implementation,
        parse_address(IMPLEMENTATION).map(|a| a.as_bytes().to_vec())
    );
    assert_eq!(contract.fetch_retries, 1);

    // the implementation download landed on the queue
    let client = redis::Client::open(context.settings.redis_url.as_str()).unwrap();
    let mut redis = client.get_async_connection().await.unwrap();
    let payloads: Vec<String> = redis.lrange(TASKS_QUEUE, 0, -1).await.unwrap();
    assert_eq!(payloads.len(), 1);
    assert!(payloads[0].contains(&IMPLEMENTATION.to_lowercase()));

    // the ABI is content addressed under the winning provider's source
    let (source, created) =
        AbiSource::get_or_create(&context.pool, "Etherscan", "https://etherscan.io")
            .await
            .unwrap();
    assert!(!created);
    let (_, created) = Abi::get_or_create(
        &context.pool,
        &json!([{"stateMutability":"payable","type":"fallback"}]),
        source.id,
        0,
    )
    .await
    .unwrap();
    assert!(!created);

    // a known ABI suppresses further download attempts
    assert!(!context.contract_metadata.should_attempt_download(address, 1).await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "needs live postgres and redis"]
async fn failed_download_increments_the_retry_budget() {
    let context = test_context().await;
    let address = parse_address(PROXY).unwrap();
    let miss = EnhancedContractMetadata { address, chain_id: 1, metadata: None, source: None };

    for expected_retries in 1..=2 {
        let found = context.contract_metadata.process_enhanced(miss.clone()).await.unwrap();
        assert!(!found);
        let contract =
            Contract::get(&context.pool, address.as_bytes(), 1).await.unwrap().unwrap();
        assert_eq!(contract.fetch_retries, expected_retries);
        assert!(contract.abi_id.is_none());
    }

    // still within budget, the attempt gate stays open
    assert!(context.contract_metadata.should_attempt_download(address, 1).await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "needs live postgres and redis"]
async fn hot_reload_adds_selectors_for_new_abis() {
    let context = test_context().await;
    abis::load_local_abis(&context.pool).await.unwrap();

    let decoder =
        decoder_service::services::data_decoder::DataDecoderService::new(context.pool.clone())
            .await
            .unwrap();
    assert_eq!(decoder.load_new_abis().await.unwrap(), 0);

    let (source, _) =
        AbiSource::get_or_create(&context.pool, "localstorage", "decoder-service")
            .await
            .unwrap();
    let new_abi = json!([{
        "type": "function",
        "name": "claimRewards",
        "inputs": [{"name": "account", "type": "address"}],
        "outputs": []
    }]);
    Abi::get_or_create(&context.pool, &new_abi, source.id, 0).await.unwrap();

    assert_eq!(decoder.load_new_abis().await.unwrap(), 1);
    // the second pass has nothing new
    assert_eq!(decoder.load_new_abis().await.unwrap(), 0);
}
