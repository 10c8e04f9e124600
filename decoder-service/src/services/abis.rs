//! Seeding of the well-known ABIs shipped with the service.
//!
//! Inserted once per startup under the `localstorage` source; the Safe core
//! contracts carry the highest relevance so their parameter names win
//! selector collisions against token and third-party ABIs.

use anyhow::Context;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;

use decoder_db::{Abi, AbiSource};

/// Relevance tiers, highest wins on selector collision.
const RELEVANCE_SAFE: i32 = 100;
const RELEVANCE_ERC: i32 = 90;
const RELEVANCE_THIRD_PARTY: i32 = 50;

const SAFE_V1_1_1: &str = include_str!("../../assets/abis/safe_v1_1_1.json");
const SAFE_V1_3_0: &str = include_str!("../../assets/abis/safe_v1_3_0.json");
const SAFE_V1_4_1: &str = include_str!("../../assets/abis/safe_v1_4_1.json");
const MULTI_SEND: &str = include_str!("../../assets/abis/multi_send.json");
const MULTI_SEND_CALL_ONLY: &str = include_str!("../../assets/abis/multi_send_call_only.json");
const ERC20: &str = include_str!("../../assets/abis/erc20.json");
const ERC721: &str = include_str!("../../assets/abis/erc721.json");
const GNOSIS_PROTOCOL: &str = include_str!("../../assets/abis/gnosis_protocol.json");

fn parse(name: &str, raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|err| panic!("embedded ABI {name} is valid JSON: {err}"))
}

/// The Safe core contract ABIs.
pub fn safe_contract_documents() -> Vec<Value> {
    vec![
        parse("safe_v1_1_1", SAFE_V1_1_1),
        parse("safe_v1_3_0", SAFE_V1_3_0),
        parse("safe_v1_4_1", SAFE_V1_4_1),
    ]
}

/// Token standards and Safe library contracts.
pub fn erc_and_library_documents() -> Vec<Value> {
    vec![
        parse("erc20", ERC20),
        parse("erc721", ERC721),
        parse("multi_send", MULTI_SEND),
        parse("multi_send_call_only", MULTI_SEND_CALL_ONLY),
    ]
}

/// Third-party protocol ABIs.
pub fn third_party_documents() -> Vec<Value> {
    vec![parse("gnosis_protocol", GNOSIS_PROTOCOL)]
}

/// The MultiSend ABIs, used by the decoder to spot batch calls.
pub fn multisend_documents() -> Vec<Value> {
    vec![parse("multi_send", MULTI_SEND), parse("multi_send_call_only", MULTI_SEND_CALL_ONLY)]
}

/// Insert every embedded ABI that is not in the database yet.
pub async fn load_local_abis(pool: &PgPool) -> anyhow::Result<usize> {
    let (source, _) = AbiSource::get_or_create(pool, "localstorage", "decoder-service")
        .await
        .context("cannot resolve the localstorage ABI source")?;

    let mut created = 0;
    for (documents, relevance) in [
        (safe_contract_documents(), RELEVANCE_SAFE),
        (erc_and_library_documents(), RELEVANCE_ERC),
        (third_party_documents(), RELEVANCE_THIRD_PARTY),
    ] {
        for document in &documents {
            let (_, was_created) = Abi::get_or_create(pool, document, source.id, relevance)
                .await
                .context("cannot store embedded ABI")?;
            if was_created {
                created += 1;
            }
        }
    }
    if created > 0 {
        info!(target: "abis", created, "stored embedded ABIs");
    }
    Ok(created)
}
