//! The decoding registry: maps 4-byte selectors to function descriptors and
//! turns opaque calldata into named, normalized parameters.
//!
//! The global selector table is built once from every stored ABI in
//! ascending relevance, so the most relevant document wins a collision.
//! Hot reload only ever adds selectors; a selector already in the table is
//! never replaced while concurrent decodes may hold it. Contract-specific
//! lookups go through fixed-size LRU caches; a database failure there
//! degrades to a miss, never to a failed decode.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::{FutureExt, TryStreamExt};
use lru::LruCache;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use decoder_core::abi::{canonical_type, normalize_token, AbiDocument, AbiFunction};
use decoder_core::multisend::MultiSendTx;
use decoder_core::utils::{parse_address, parse_hex_data, to_checksum};
use decoder_core::{Address, Selector, EXEC_TRANSACTION_SELECTOR};
use decoder_db::{Abi, Contract};

use super::abis::multisend_documents;

/// Entries kept per contract-lookup cache.
const CONTRACT_CACHE_SIZE: usize = 2048;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DataDecoderError {
    /// The data is empty or no known ABI matches its selector.
    #[error("cannot decode data")]
    CannotDecode,
    /// An ABI matched but the calldata does not decode against it.
    #[error("unexpected problem decoding data")]
    UnexpectedProblemDecoding,
}

/// How precisely the matched ABI is known to describe the target contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecodingAccuracy {
    FullMatch,
    PartialMatch,
    OnlyFunctionMatch,
    NoMatch,
}

/// One decoded argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDecoded {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_decoded: Option<Value>,
}

/// A decoded call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataDecoded {
    pub method: String,
    pub parameters: Vec<ParameterDecoded>,
}

/// One decoded MultiSend sub-call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultisendDecoded {
    pub operation: u8,
    pub to: String,
    pub value: String,
    pub data: Option<String>,
    pub data_decoded: Option<DataDecoded>,
}

/// Selector table of a single contract's ABI.
struct ContractAbi {
    selectors: HashMap<Selector, AbiFunction>,
    fallback: Option<AbiFunction>,
}

impl ContractAbi {
    fn from_document(document: &Value) -> Self {
        let mut selectors = HashMap::new();
        let mut fallback = None;
        match serde_json::from_value::<AbiDocument>(document.clone()) {
            Ok(doc) => {
                for function in doc.functions().filter_map(AbiFunction::from_item) {
                    selectors.insert(function.selector(), function);
                }
                if doc.fallback().is_some() {
                    fallback = Some(AbiFunction::fallback());
                }
            }
            Err(err) => warn!(target: "data_decoder", %err, "stored ABI is not a descriptor list"),
        }
        Self { selectors, fallback }
    }
}

type ContractAbiCache = LruCache<(Address, Option<i64>), Option<Arc<ContractAbi>>>;

pub struct DataDecoderService {
    pool: PgPool,
    /// Global selector table, aggregated over every stored ABI.
    fn_selectors_with_abis: RwLock<HashMap<Selector, AbiFunction>>,
    /// Selectors of the MultiSend batch entry points.
    multisend_fn_selectors: HashMap<Selector, AbiFunction>,
    /// `created` of the newest ABI already folded into the table.
    last_abi_created: RwLock<Option<DateTime<Utc>>>,
    /// `(address, chain)` → parsed contract ABI. The `None` chain entry
    /// holds the cross-chain fallback result.
    contract_abis: Mutex<ContractAbiCache>,
}

impl DataDecoderService {
    /// Build the registry from every ABI in the database.
    pub async fn new(pool: PgPool) -> sqlx::Result<Self> {
        info!(target: "data_decoder", "loading contract ABIs for decoding");
        let service = Self::empty(pool);
        {
            let mut table = service.fn_selectors_with_abis.write().await;
            let mut stream = Abi::stream_by_relevance_ascending(&service.pool);
            while let Some(document) = stream.try_next().await? {
                for function in document_functions(&document) {
                    // later documents are more relevant and take the selector
                    table.insert(function.selector(), function);
                }
            }
        }
        *service.last_abi_created.write().await = Abi::last_created(&service.pool).await?;
        info!(target: "data_decoder", "contract ABIs for decoding were loaded");
        Ok(service)
    }

    fn empty(pool: PgPool) -> Self {
        let mut multisend_fn_selectors = HashMap::new();
        for document in multisend_documents() {
            for function in document_functions(&document) {
                multisend_fn_selectors.insert(function.selector(), function);
            }
        }
        Self {
            pool,
            fn_selectors_with_abis: RwLock::new(HashMap::new()),
            multisend_fn_selectors,
            last_abi_created: RwLock::new(None),
            contract_abis: Mutex::new(LruCache::new(
                NonZeroUsize::new(CONTRACT_CACHE_SIZE).expect("cache size is non-zero"),
            )),
        }
    }

    /// Fold ABIs inserted since the last load into the selector table.
    /// Existing selectors are left untouched so concurrent decodes never see
    /// a descriptor change under them. Returns the number of selectors added.
    pub async fn load_new_abis(&self) -> sqlx::Result<usize> {
        let since = self
            .last_abi_created
            .read()
            .await
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let mut added = 0;
        let mut newest = None;
        {
            let mut table = self.fn_selectors_with_abis.write().await;
            let mut stream = Abi::stream_created_after(&self.pool, since);
            while let Some((created, document)) = stream.try_next().await? {
                for function in document_functions(&document) {
                    let selector = function.selector();
                    if !table.contains_key(&selector) {
                        table.insert(selector, function);
                        added += 1;
                    }
                }
                newest = Some(created);
            }
        }
        if let Some(newest) = newest {
            *self.last_abi_created.write().await = Some(newest);
        }
        if added > 0 {
            info!(target: "data_decoder", added, "loaded new ABI selectors");
        }
        Ok(added)
    }

    /// The contract ABI stored for exactly these coordinates; the `None`
    /// chain key resolves across chains by ascending chain id.
    async fn cached_contract_abi(
        &self,
        address: Address,
        chain_id: Option<i64>,
    ) -> Option<Arc<ContractAbi>> {
        let key = (address, chain_id);
        {
            let mut cache = self.contract_abis.lock().await;
            if let Some(entry) = cache.get(&key) {
                return entry.clone();
            }
        }

        let fetched = match Contract::abi_json_for(&self.pool, address.as_bytes(), chain_id).await
        {
            Ok(document) => {
                document.map(|document| Arc::new(ContractAbi::from_document(&document)))
            }
            Err(err) => {
                // degrade to an uncached miss, the global table still serves
                warn!(target: "data_decoder", address = ?address, %err, "cannot fetch contract ABI");
                return None;
            }
        };
        self.contract_abis.lock().await.put(key, fetched.clone());
        fetched
    }

    /// Contract ABI with the cross-chain fallback applied.
    async fn contract_abi(
        &self,
        address: Address,
        chain_id: Option<i64>,
    ) -> Option<Arc<ContractAbi>> {
        if let Some(chain_id) = chain_id {
            if let Some(abi) = self.cached_contract_abi(address, Some(chain_id)).await {
                return Some(abi);
            }
        }
        self.cached_contract_abi(address, None).await
    }

    /// Resolve the function descriptor for calldata.
    ///
    /// A selector in the global table can be refined by the ABI stored for
    /// the specific contract; a selector unknown globally falls back to the
    /// contract's `fallback` descriptor when one exists.
    pub async fn get_abi_function(
        &self,
        data: &[u8],
        address: Option<Address>,
        chain_id: Option<i64>,
    ) -> Option<AbiFunction> {
        let selector: Selector = data.get(..4)?.try_into().ok()?;
        let global = self.fn_selectors_with_abis.read().await.get(&selector).cloned();

        if global.is_some() {
            if let Some(address) = address {
                if let Some(contract_abi) = self.contract_abi(address, chain_id).await {
                    if let Some(function) = contract_abi.selectors.get(&selector) {
                        return Some(function.clone());
                    }
                }
            }
            return global;
        }
        if let Some(address) = address {
            return self.contract_abi(address, chain_id).await?.fallback.clone();
        }
        None
    }

    /// Decode calldata into the function name and its normalized arguments.
    async fn decode_data(
        &self,
        data: &[u8],
        address: Option<Address>,
        chain_id: Option<i64>,
    ) -> Result<(String, Vec<ParameterDecoded>), DataDecoderError> {
        if data.is_empty() {
            return Err(DataDecoderError::CannotDecode);
        }
        let function = self
            .get_abi_function(data, address, chain_id)
            .await
            .ok_or(DataDecoderError::CannotDecode)?;

        let tokens = function.decode_input(&data[4..]).map_err(|err| {
            warn!(target: "data_decoder", data = %hex::encode(data), %err, "cannot decode");
            DataDecoderError::UnexpectedProblemDecoding
        })?;

        let parameters = function
            .inputs
            .iter()
            .zip(tokens)
            .map(|(input, token)| ParameterDecoded {
                name: input.name.clone(),
                param_type: canonical_type(input),
                value: normalize_token(&token),
                value_decoded: None,
            })
            .collect();
        Ok((function.name, parameters))
    }

    /// Decode calldata and populate the nested `value_decoded` fields.
    pub async fn decode_transaction_with_types(
        &self,
        data: &[u8],
        address: Option<Address>,
        chain_id: Option<i64>,
    ) -> Result<(String, Vec<ParameterDecoded>), DataDecoderError> {
        let (method, parameters) = self.decode_data(data, address, chain_id).await?;
        let parameters = self.decode_parameters_data(data, parameters, chain_id).await;
        Ok((method, parameters))
    }

    /// Decoded representation of calldata, `None` when it cannot be decoded.
    pub fn get_data_decoded<'a>(
        &'a self,
        data: &'a [u8],
        address: Option<Address>,
        chain_id: Option<i64>,
    ) -> BoxFuture<'a, Option<DataDecoded>> {
        async move {
            if data.is_empty() {
                return None;
            }
            match self.decode_transaction_with_types(data, address, chain_id).await {
                Ok((method, parameters)) => Some(DataDecoded { method, parameters }),
                Err(_) => None,
            }
        }
        .boxed()
    }

    /// Nested decoding of MultiSend batches and wrapped `execTransaction`
    /// payloads.
    async fn decode_parameters_data(
        &self,
        data: &[u8],
        mut parameters: Vec<ParameterDecoded>,
        chain_id: Option<i64>,
    ) -> Vec<ParameterDecoded> {
        let Some(selector) = data.get(..4) else {
            return parameters;
        };
        let selector: Selector = selector.try_into().expect("slice of length four");

        if self.multisend_fn_selectors.contains_key(&selector) {
            if !parameters.is_empty() {
                if let Some(decoded) = self.decode_multisend_data(data, chain_id).await {
                    parameters[0].value_decoded = serde_json::to_value(decoded).ok();
                }
            }
        } else if selector == EXEC_TRANSACTION_SELECTOR && parameters.len() > 2 {
            // function execTransaction(address to, uint256 value, bytes data, ...):
            // decode the inner data against the inner target
            let inner_data = parameters[2].value.as_str().and_then(parse_hex_data);
            if let Some(inner_data) = inner_data.filter(|data| !data.is_empty()) {
                let inner_to = parameters[0].value.as_str().and_then(parse_address);
                let decoded = self.get_data_decoded(&inner_data, inner_to, chain_id).await;
                parameters[2].value_decoded =
                    decoded.and_then(|decoded| serde_json::to_value(decoded).ok());
            }
        }
        parameters
    }

    /// Decode a MultiSend batch into its sub-calls. Malformed batches are
    /// logged and yield `None`.
    pub async fn decode_multisend_data(
        &self,
        data: &[u8],
        chain_id: Option<i64>,
    ) -> Option<Vec<MultisendDecoded>> {
        let txs = match MultiSendTx::from_transaction_data(data) {
            Ok(txs) => txs,
            Err(err) => {
                warn!(
                    target: "data_decoder",
                    data = %hex::encode(data),
                    %err,
                    "problem decoding multisend transaction"
                );
                return None;
            }
        };

        let mut decoded = Vec::with_capacity(txs.len());
        for tx in &txs {
            decoded.push(MultisendDecoded {
                operation: tx.operation as u8,
                to: to_checksum(&tx.to),
                value: tx.value.to_string(),
                data: (!tx.data.is_empty()).then(|| format!("0x{}", hex::encode(&tx.data))),
                data_decoded: self.get_data_decoded(&tx.data, Some(tx.to), chain_id).await,
            });
        }
        Some(decoded)
    }

    /// Classify how precisely the decode matched the target contract.
    pub async fn get_decoding_accuracy(
        &self,
        data: &[u8],
        address: Option<Address>,
        chain_id: Option<i64>,
    ) -> DecodingAccuracy {
        let Some(selector) = data.get(..4) else {
            return DecodingAccuracy::NoMatch;
        };
        let selector: Selector = selector.try_into().expect("slice of length four");
        if !self.fn_selectors_with_abis.read().await.contains_key(&selector) {
            return DecodingAccuracy::NoMatch;
        }

        if let Some(address) = address {
            if let Some(chain_id) = chain_id {
                if let Some(contract_abi) = self.cached_contract_abi(address, Some(chain_id)).await
                {
                    if contract_abi.selectors.contains_key(&selector) {
                        return DecodingAccuracy::FullMatch;
                    }
                }
            }
            if self.cached_contract_abi(address, None).await.is_some() {
                return DecodingAccuracy::PartialMatch;
            }
        }
        DecodingAccuracy::OnlyFunctionMatch
    }
}

fn document_functions(document: &Value) -> Vec<AbiFunction> {
    match serde_json::from_value::<AbiDocument>(document.clone()) {
        Ok(doc) => doc.functions().filter_map(AbiFunction::from_item).collect(),
        Err(err) => {
            warn!(target: "data_decoder", %err, "stored ABI is not a descriptor list");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::abis;
    use ethabi::Token;
    use serde_json::json;

    const OWNER: &str = "0x1b9a0DA11a5caCE4e7035993Cbb2E4B1B3b164Cf";
    const COW_SETTLEMENT: &str = "0x9008D19f58AAbD9eD0D60971565AA8510560ab41";
    const SAFE: &str = "0xd9Db270c1B5E3Bd161E8c8503c55cEABeE709552";

    /// Registry over the given documents, backed by a pool that is never
    /// reachable: contract lookups degrade to misses unless seeded.
    fn registry(documents: Vec<Value>) -> DataDecoderService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://decoder@127.0.0.1:1/decoder")
            .unwrap();
        let service = DataDecoderService::empty(pool);
        {
            let mut table = service.fn_selectors_with_abis.try_write().unwrap();
            for document in &documents {
                for function in document_functions(document) {
                    table.insert(function.selector(), function);
                }
            }
        }
        service
    }

    async fn seed_contract(
        service: &DataDecoderService,
        address: Address,
        chain_id: Option<i64>,
        document: &Value,
    ) {
        service
            .contract_abis
            .lock()
            .await
            .put((address, chain_id), Some(Arc::new(ContractAbi::from_document(document))));
    }

    fn default_registry() -> DataDecoderService {
        let mut documents = abis::safe_contract_documents();
        documents.extend(abis::erc_and_library_documents());
        documents.extend(abis::third_party_documents());
        registry(documents)
    }

    fn add_owner_calldata() -> Vec<u8> {
        let mut data = vec![0x0d, 0x58, 0x2f, 0x13];
        data.extend(ethabi::encode(&[
            Token::Address(parse_address(OWNER).unwrap()),
            Token::Uint(1u64.into()),
        ]));
        data
    }

    fn exec_transaction_calldata(to: Address, inner: &[u8]) -> Vec<u8> {
        let mut data = EXEC_TRANSACTION_SELECTOR.to_vec();
        data.extend(ethabi::encode(&[
            Token::Address(to),
            Token::Uint(0u64.into()),
            Token::Bytes(inner.to_vec()),
            Token::Uint(0u64.into()),
            Token::Uint(0u64.into()),
            Token::Uint(0u64.into()),
            Token::Uint(0u64.into()),
            Token::Address(Address::zero()),
            Token::Address(Address::zero()),
            Token::Bytes(Vec::new()),
        ]));
        data
    }

    #[tokio::test]
    async fn unknown_selector_on_empty_registry_is_not_decoded() {
        let service = registry(Vec::new());
        let data = [0x12, 0x34, 0x56, 0x78];

        assert_eq!(service.get_data_decoded(&data, None, None).await, None);
        assert_eq!(
            service.get_decoding_accuracy(&data, None, None).await,
            DecodingAccuracy::NoMatch
        );
    }

    #[tokio::test]
    async fn empty_data_cannot_be_decoded() {
        let service = default_registry();
        assert_eq!(
            service.decode_transaction_with_types(&[], None, None).await,
            Err(DataDecoderError::CannotDecode)
        );
    }

    #[tokio::test]
    async fn malformed_calldata_is_an_unexpected_problem() {
        let service = default_registry();
        // addOwnerWithThreshold selector with a truncated argument section
        let data = [0x0d, 0x58, 0x2f, 0x13, 0xff];
        assert_eq!(
            service.decode_transaction_with_types(&data, None, None).await,
            Err(DataDecoderError::UnexpectedProblemDecoding)
        );
    }

    #[tokio::test]
    async fn decodes_add_owner_with_threshold() {
        let service = default_registry();
        let decoded =
            service.get_data_decoded(&add_owner_calldata(), None, None).await.unwrap();

        assert_eq!(decoded.method, "addOwnerWithThreshold");
        assert_eq!(decoded.parameters.len(), 2);
        assert_eq!(decoded.parameters[0].name, "owner");
        assert_eq!(decoded.parameters[0].param_type, "address");
        assert_eq!(decoded.parameters[0].value, json!(OWNER));
        assert_eq!(decoded.parameters[1].name, "_threshold");
        assert_eq!(decoded.parameters[1].param_type, "uint256");
        assert_eq!(decoded.parameters[1].value, json!("1"));

        assert_eq!(
            service.get_decoding_accuracy(&add_owner_calldata(), None, None).await,
            DecodingAccuracy::OnlyFunctionMatch
        );
    }

    #[tokio::test]
    async fn contract_specific_abi_disambiguates_by_chain() {
        let doc = |first: &str, second: &str| {
            json!([{
                "type": "function",
                "name": "transfer",
                "inputs": [
                    {"name": first, "type": "address"},
                    {"name": second, "type": "uint256"}
                ],
                "outputs": []
            }])
        };
        let chain_1_doc = doc("to", "value");
        let chain_2_doc = doc("value_name", "to_name");

        let service = registry(vec![chain_1_doc.clone()]);
        let address = parse_address(OWNER).unwrap();
        seed_contract(&service, address, Some(1), &chain_1_doc).await;
        seed_contract(&service, address, Some(2), &chain_2_doc).await;
        // the cross-chain fallback resolves to the lowest chain id
        seed_contract(&service, address, None, &chain_1_doc).await;

        let mut data = vec![0xa9, 0x05, 0x9c, 0xbb];
        data.extend(ethabi::encode(&[
            Token::Address(Address::zero()),
            Token::Uint(5u64.into()),
        ]));

        let on_chain_1 =
            service.get_data_decoded(&data, Some(address), Some(1)).await.unwrap();
        assert_eq!(on_chain_1.parameters[0].name, "to");
        assert_eq!(
            service.get_decoding_accuracy(&data, Some(address), Some(1)).await,
            DecodingAccuracy::FullMatch
        );

        let on_chain_2 =
            service.get_data_decoded(&data, Some(address), Some(2)).await.unwrap();
        assert_eq!(on_chain_2.parameters[0].name, "value_name");
        assert_eq!(
            service.get_decoding_accuracy(&data, Some(address), Some(2)).await,
            DecodingAccuracy::FullMatch
        );

        // an unknown chain falls back to the lowest registered chain
        let on_chain_3 =
            service.get_data_decoded(&data, Some(address), Some(3)).await.unwrap();
        assert_eq!(on_chain_3.parameters[0].name, "to");
        assert_eq!(
            service.get_decoding_accuracy(&data, Some(address), Some(3)).await,
            DecodingAccuracy::PartialMatch
        );

        // no chain hint falls back identically
        let no_chain = service.get_data_decoded(&data, Some(address), None).await.unwrap();
        assert_eq!(no_chain.parameters[0].name, "to");
        assert_eq!(
            service.get_decoding_accuracy(&data, Some(address), None).await,
            DecodingAccuracy::PartialMatch
        );
    }

    #[tokio::test]
    async fn decodes_nested_exec_transaction() {
        let service = default_registry();

        // setPreSignature(bytes orderUid, bool signed)
        let mut inner = vec![0xec, 0x6c, 0xb1, 0x3f];
        inner.extend(ethabi::encode(&[
            Token::Bytes(vec![0xab; 56]),
            Token::Bool(true),
        ]));
        let data =
            exec_transaction_calldata(parse_address(COW_SETTLEMENT).unwrap(), &inner);

        let decoded = service.get_data_decoded(&data, None, None).await.unwrap();
        assert_eq!(decoded.method, "execTransaction");

        let value_decoded = decoded.parameters[2].value_decoded.as_ref().unwrap();
        assert_eq!(value_decoded["method"], json!("setPreSignature"));
        assert_eq!(value_decoded["parameters"][0]["name"], json!("orderUid"));
        assert_eq!(
            value_decoded["parameters"][1],
            json!({"name": "signed", "type": "bool", "value": "True"})
        );
    }

    #[tokio::test]
    async fn decodes_multisend_batches() {
        let service = default_registry();
        let safe = parse_address(SAFE).unwrap();

        // changeMasterCopy(address) + setFallbackHandler(address)
        let mut change_master_copy = vec![0x7d, 0xe7, 0xed, 0xef];
        change_master_copy
            .extend(ethabi::encode(&[Token::Address(parse_address(OWNER).unwrap())]));
        let mut set_fallback_handler = vec![0xf0, 0x8a, 0x03, 0x23];
        set_fallback_handler
            .extend(ethabi::encode(&[Token::Address(parse_address(COW_SETTLEMENT).unwrap())]));

        let batch = [
            decoder_core::multisend::MultiSendTx {
                operation: decoder_core::multisend::Operation::Call,
                to: safe,
                value: 0u64.into(),
                data: change_master_copy,
            },
            decoder_core::multisend::MultiSendTx {
                operation: decoder_core::multisend::Operation::Call,
                to: safe,
                value: 0u64.into(),
                data: set_fallback_handler,
            },
        ];
        let calldata = MultiSendTx::encode_calldata(&batch);

        let decoded = service.get_data_decoded(&calldata, None, None).await.unwrap();
        assert_eq!(decoded.method, "multiSend");

        let value_decoded = decoded.parameters[0].value_decoded.as_ref().unwrap();
        let sub_calls = value_decoded.as_array().unwrap();
        assert_eq!(sub_calls.len(), 2);
        for (sub_call, method) in
            sub_calls.iter().zip(["changeMasterCopy", "setFallbackHandler"])
        {
            assert_eq!(sub_call["operation"], json!(0));
            assert_eq!(sub_call["to"], json!(SAFE));
            assert_eq!(sub_call["value"], json!("0"));
            assert!(sub_call["data"].as_str().unwrap().starts_with("0x"));
            assert_eq!(sub_call["data_decoded"]["method"], json!(method));
        }
    }

    #[tokio::test]
    async fn malformed_multisend_payloads_yield_none() {
        let service = default_registry();

        // garbage instead of an encoded bytes argument fails the decode itself
        let mut data = decoder_core::multisend::MULTISEND_SELECTOR.to_vec();
        data.extend([0xff; 8]);
        assert_eq!(
            service.decode_transaction_with_types(&data, None, None).await,
            Err(DataDecoderError::UnexpectedProblemDecoding)
        );

        // a well-formed bytes argument with a malformed packed batch decodes
        // the outer call but leaves `value_decoded` unset
        let mut data = decoder_core::multisend::MULTISEND_SELECTOR.to_vec();
        data.extend(ethabi::encode(&[Token::Bytes(vec![0x05; 10])]));
        let (method, parameters) =
            service.decode_transaction_with_types(&data, None, None).await.unwrap();
        assert_eq!(method, "multiSend");
        assert_eq!(parameters[0].value_decoded, None);
    }

    #[tokio::test]
    async fn falls_back_to_the_contract_fallback_function() {
        let service = registry(Vec::new());
        let address = parse_address(OWNER).unwrap();
        seed_contract(
            &service,
            address,
            None,
            &json!([{"stateMutability": "payable", "type": "fallback"}]),
        )
        .await;

        let decoded = service
            .get_data_decoded(&[0xde, 0xad, 0xbe, 0xef], Some(address), None)
            .await
            .unwrap();
        assert_eq!(decoded.method, "fallback");
        assert!(decoded.parameters.is_empty());
    }

    #[tokio::test]
    async fn serializes_accuracy_in_wire_format() {
        assert_eq!(
            serde_json::to_value(DecodingAccuracy::FullMatch).unwrap(),
            json!("FULL_MATCH")
        );
        assert_eq!(
            serde_json::to_value(DecodingAccuracy::OnlyFunctionMatch).unwrap(),
            json!("ONLY_FUNCTION_MATCH")
        );
    }
}
