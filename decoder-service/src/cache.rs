//! Redis-backed caches.
//!
//! Two logical caches share one connection: the response cache, a hash per
//! contract address whose fields are one cached endpoint response each, and
//! the negative-attempt cache gating metadata downloads. Neither cache is
//! authoritative; every error degrades to a miss.

use decoder_core::{abi::canonical_json, Address};
use md5::{Digest, Md5};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

/// Response-cache TTL applied when the contract key has none yet.
pub const RESPONSE_CACHE_TTL_SECS: i64 = 60;

#[derive(Clone)]
pub struct ServiceCache {
    redis: ConnectionManager,
}

impl ServiceCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// The hash key holding every cached response variant for a contract.
    pub fn contract_key(address: &Address) -> String {
        format!("contract:0x{}", hex::encode(address))
    }

    /// Cached response for one endpoint variant, `None` on miss or error.
    pub async fn get_response(&self, hash_key: &str, field_key: &str) -> Option<String> {
        let mut redis = self.redis.clone();
        match redis.hget::<_, _, Option<String>>(hash_key, field_key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "cache", %err, "cannot read response cache");
                None
            }
        }
    }

    /// Store a response variant. The TTL is only set when the key has none,
    /// so cached variants of one contract expire together.
    pub async fn store_response(&self, hash_key: &str, field_key: &str, response: &str) {
        let mut redis = self.redis.clone();
        if let Err(err) = redis.hset::<_, _, _, ()>(hash_key, field_key, response).await {
            warn!(target: "cache", %err, "cannot write response cache");
            return;
        }
        match redis.ttl::<_, i64>(hash_key).await {
            Ok(-1) => {
                if let Err(err) =
                    redis.expire::<_, ()>(hash_key, RESPONSE_CACHE_TTL_SECS).await
                {
                    warn!(target: "cache", %err, "cannot set response cache expiry");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(target: "cache", %err, "cannot read response cache ttl"),
        }
    }

    /// Drop every cached response for the contract.
    pub async fn invalidate_contract(&self, address: &Address) {
        let mut redis = self.redis.clone();
        let key = Self::contract_key(address);
        if let Err(err) = redis.unlink::<_, ()>(&key).await {
            warn!(target: "cache", %err, %key, "cannot invalidate response cache");
        }
    }

    fn attempt_key(address: &Address, chain_id: u64, max_retries: i32) -> String {
        format!(
            "should_attempt_download:0x{}:{chain_id}:{max_retries}",
            hex::encode(address)
        )
    }

    /// Whether a metadata download should be attempted. Only an explicit
    /// negative marker suppresses the attempt; errors never do.
    pub async fn should_attempt_download(
        &self,
        address: &Address,
        chain_id: u64,
        max_retries: i32,
    ) -> bool {
        let mut redis = self.redis.clone();
        let key = Self::attempt_key(address, chain_id, max_retries);
        match redis.get::<_, Option<String>>(&key).await {
            Ok(Some(value)) => value != "0",
            Ok(None) => true,
            Err(err) => {
                warn!(target: "cache", %err, "cannot read attempt cache");
                true
            }
        }
    }

    /// Record that downloads for these coordinates are pointless (retry
    /// budget exhausted or ABI already known). No TTL; cleared externally
    /// when the retry budget changes.
    pub async fn mark_should_not_attempt(
        &self,
        address: &Address,
        chain_id: u64,
        max_retries: i32,
    ) {
        let mut redis = self.redis.clone();
        let key = Self::attempt_key(address, chain_id, max_retries);
        if let Err(err) = redis.set::<_, _, ()>(&key, "0").await {
            warn!(target: "cache", %err, "cannot write attempt cache");
        }
    }
}

/// Field key of one cached endpoint variant: the MD5 of the outward URL plus
/// the enumerated query parameters of the endpoint, canonically serialized.
pub fn response_field_key<K: Serialize>(url_path: &str, kwargs: &K) -> String {
    let mut payload = match serde_json::to_value(kwargs) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    payload.insert("url".to_owned(), json!(url_path));
    let digest = Md5::digest(canonical_json(&Value::Object(payload)).as_bytes());
    hex::encode(digest)
}

/// Query parameters of the paginated contracts endpoint that shape its
/// response, enumerated explicitly so the cache key never depends on
/// incidental request state.
#[derive(Debug, Clone, Serialize)]
pub struct ContractPageKey {
    pub chain_ids: Option<Vec<i64>>,
    pub limit: i64,
    pub offset: i64,
}
