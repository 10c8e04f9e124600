//! Paginated contract listings backing the HTTP surface.

use std::collections::HashMap;

use http::HeaderMap;
use serde::Serialize;
use sqlx::PgPool;
use tracing::debug;
use url::Url;

use decoder_core::{utils::to_checksum, Address};
use decoder_db::{Contract, ContractQuery, Project};

use crate::cache::{response_field_key, ContractPageKey, ServiceCache};
use crate::services::pagination::{GenericPagination, PaginatedResponse};
use crate::utils::{datetime_to_str, proxy_aware_url};

/// Wire representation of a contract row.
#[derive(Debug, Clone, Serialize)]
pub struct ContractPublic {
    pub address: String,
    pub chain_id: i64,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub trusted_for_delegate_call: bool,
    pub implementation: Option<String>,
    pub fetch_retries: i32,
    pub has_abi: bool,
    pub logo_url: Option<String>,
    pub created: String,
    pub modified: String,
}

impl ContractPublic {
    fn new(contract: &Contract, project: Option<&Project>, logo_base_url: &str) -> Self {
        let logo_url = project.filter(|_| !logo_base_url.is_empty()).map(|project| {
            format!("{}/{}", logo_base_url.trim_end_matches('/'), project.logo_file)
        });
        Self {
            address: checksum_bytes(&contract.address),
            chain_id: contract.chain_id,
            name: contract.name.clone(),
            display_name: contract.display_name.clone(),
            description: contract.description.clone(),
            trusted_for_delegate_call: contract.trusted_for_delegate_call,
            implementation: contract.implementation.as_deref().map(checksum_bytes),
            fetch_retries: contract.fetch_retries,
            has_abi: contract.abi_id.is_some(),
            logo_url,
            created: datetime_to_str(contract.created),
            modified: datetime_to_str(contract.modified),
        }
    }
}

fn checksum_bytes(bytes: &[u8]) -> String {
    if bytes.len() == 20 {
        to_checksum(&Address::from_slice(bytes))
    } else {
        format!("0x{}", hex::encode(bytes))
    }
}

pub struct ContractService {
    pool: PgPool,
    cache: ServiceCache,
    logo_base_url: String,
}

impl ContractService {
    pub fn new(pool: PgPool, cache: ServiceCache, logo_base_url: String) -> Self {
        Self { pool, cache, logo_base_url }
    }

    /// One page of the global contract listing.
    pub async fn get_contracts(
        &self,
        base_url: &Url,
        chain_ids: Option<Vec<i64>>,
        trusted_for_delegate_call: Option<bool>,
        pagination: GenericPagination,
    ) -> sqlx::Result<PaginatedResponse<ContractPublic>> {
        let query = ContractQuery {
            address: None,
            chain_ids,
            trusted_for_delegate_call,
            only_with_abi: false,
        };
        self.fetch_page(&query, base_url, pagination).await
    }

    /// One page of a single address across chains, cached per contract under
    /// the request's outward URL and query parameters.
    pub async fn get_contracts_by_address_cached(
        &self,
        base_url: &Url,
        headers: &HeaderMap,
        address: Address,
        chain_ids: Option<Vec<i64>>,
        pagination: GenericPagination,
    ) -> sqlx::Result<String> {
        let outward_url = proxy_aware_url(base_url, headers);
        let hash_key = ServiceCache::contract_key(&address);
        let field_key = response_field_key(
            outward_url.path(),
            &ContractPageKey {
                chain_ids: chain_ids.clone(),
                limit: pagination.limit(),
                offset: pagination.offset(),
            },
        );

        if let Some(cached) = self.cache.get_response(&hash_key, &field_key).await {
            debug!(target: "contracts", %hash_key, "response cache hit");
            return Ok(cached);
        }

        let query = ContractQuery {
            address: Some(address.as_bytes().to_vec()),
            chain_ids,
            trusted_for_delegate_call: None,
            only_with_abi: false,
        };
        let page = self.fetch_page(&query, &outward_url, pagination).await?;
        let serialized = serde_json::to_string(&page).expect("contract pages serialize");
        self.cache.store_response(&hash_key, &field_key, &serialized).await;
        Ok(serialized)
    }

    async fn fetch_page(
        &self,
        query: &ContractQuery,
        base_url: &Url,
        pagination: GenericPagination,
    ) -> sqlx::Result<PaginatedResponse<ContractPublic>> {
        let contracts = query
            .fetch_page(&self.pool, pagination.limit(), pagination.offset())
            .await?;
        let count = query.count(&self.pool).await?;

        let project_ids: Vec<i64> =
            contracts.iter().filter_map(|contract| contract.project_id).collect();
        let projects: HashMap<i64, Project> = Project::get_by_ids(&self.pool, &project_ids)
            .await?
            .into_iter()
            .map(|project| (project.id, project))
            .collect();

        let results = contracts
            .iter()
            .map(|contract| {
                let project =
                    contract.project_id.and_then(|project_id| projects.get(&project_id));
                ContractPublic::new(contract, project, &self.logo_base_url)
            })
            .collect();
        Ok(pagination.paginate(base_url, results, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn contract() -> Contract {
        Contract {
            id: 1,
            address: vec![
                0x1b, 0x9a, 0x0d, 0xa1, 0x1a, 0x5c, 0xac, 0xe4, 0xe7, 0x03, 0x59, 0x93, 0xcb,
                0xb2, 0xe4, 0xb1, 0xb3, 0xb1, 0x64, 0xcf,
            ],
            chain_id: 100,
            name: Some("GnosisSafe".into()),
            display_name: Some("Safe 1.3.0".into()),
            description: None,
            trusted_for_delegate_call: false,
            implementation: None,
            fetch_retries: 1,
            abi_id: Some(7),
            project_id: Some(3),
            created: Utc.with_ymd_and_hms(2025, 3, 2, 5, 0, 30).unwrap(),
            modified: Utc.with_ymd_and_hms(2025, 3, 2, 6, 15, 0).unwrap(),
        }
    }

    #[test]
    fn serializes_contract_rows_with_checksums() {
        let public = ContractPublic::new(&contract(), None, "");
        assert_eq!(public.address, "0x1b9a0DA11a5caCE4e7035993Cbb2E4B1B3b164Cf");
        assert!(public.has_abi);
        assert_eq!(public.chain_id, 100);
        assert_eq!(public.logo_url, None);
        assert_eq!(public.created, "2025-03-02T05:00:30Z");
        assert_eq!(public.modified, "2025-03-02T06:15:00Z");
    }

    #[test]
    fn builds_logo_urls_from_the_project() {
        let project = Project {
            id: 3,
            name: "Safe".into(),
            description: "Safe wallet".into(),
            logo_file: "safe.png".into(),
        };
        let public = ContractPublic::new(
            &contract(),
            Some(&project),
            "https://assets.example/logos/",
        );
        assert_eq!(
            public.logo_url.as_deref(),
            Some("https://assets.example/logos/safe.png")
        );

        // no base url configured, no logo links
        let public = ContractPublic::new(&contract(), Some(&project), "");
        assert_eq!(public.logo_url, None);
    }
}
