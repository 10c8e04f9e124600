//! Entities and their typed accessors.

use chrono::{DateTime, Utc};
use decoder_core::abi::abi_hash;
use futures::stream::BoxStream;
use serde_json::Value;
use sqlx::{postgres::Postgres, PgPool, QueryBuilder};

/// Origin of an ABI document, e.g. the `Etherscan` row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AbiSource {
    pub id: i64,
    pub name: String,
    pub url: String,
}

impl AbiSource {
    /// Fetch the source with the given coordinates, creating it when absent.
    /// The second element tells whether a row was created.
    pub async fn get_or_create(
        pool: &PgPool,
        name: &str,
        url: &str,
    ) -> sqlx::Result<(Self, bool)> {
        let existing = sqlx::query_as::<_, Self>(
            "SELECT * FROM abisource WHERE name = $1 AND url = $2 LIMIT 1",
        )
        .bind(name)
        .bind(url)
        .fetch_optional(pool)
        .await?;
        if let Some(source) = existing {
            return Ok((source, false));
        }

        let inserted = sqlx::query_as::<_, Self>(
            "INSERT INTO abisource (name, url) VALUES ($1, $2) \
             ON CONFLICT (name, url) DO NOTHING RETURNING *",
        )
        .bind(name)
        .bind(url)
        .fetch_optional(pool)
        .await?;
        match inserted {
            Some(source) => Ok((source, true)),
            // lost the insert race, the row exists now
            None => {
                let source = sqlx::query_as::<_, Self>(
                    "SELECT * FROM abisource WHERE name = $1 AND url = $2 LIMIT 1",
                )
                .bind(name)
                .bind(url)
                .fetch_one(pool)
                .await?;
                Ok((source, false))
            }
        }
    }
}

/// A content-addressed ABI document. Immutable once created.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Abi {
    pub id: i64,
    pub abi_hash: Vec<u8>,
    pub relevance: i32,
    pub abi_json: Value,
    pub source_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Abi {
    pub async fn get_by_hash(pool: &PgPool, hash: &[u8]) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM abi WHERE abi_hash = $1 LIMIT 1")
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the ABI matching `abi_json` by content address, creating it when
    /// absent. The second element tells whether a row was created.
    pub async fn get_or_create(
        pool: &PgPool,
        abi_json: &Value,
        source_id: i64,
        relevance: i32,
    ) -> sqlx::Result<(Self, bool)> {
        let hash = abi_hash(abi_json).to_vec();
        if let Some(existing) = Self::get_by_hash(pool, &hash).await? {
            return Ok((existing, false));
        }

        let inserted = sqlx::query_as::<_, Self>(
            "INSERT INTO abi (abi_hash, abi_json, relevance, source_id) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (abi_hash) DO NOTHING RETURNING *",
        )
        .bind(&hash)
        .bind(abi_json)
        .bind(relevance)
        .bind(source_id)
        .fetch_optional(pool)
        .await?;
        match inserted {
            Some(abi) => Ok((abi, true)),
            None => {
                let abi = Self::get_by_hash(pool, &hash)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((abi, false))
            }
        }
    }

    /// Every ABI document, the least relevant first. Later entries win
    /// selector collisions when the registry is built, so ties on relevance
    /// are broken by insertion order.
    pub fn stream_by_relevance_ascending(
        pool: &PgPool,
    ) -> BoxStream<'_, sqlx::Result<Value>> {
        sqlx::query_scalar::<_, Value>(
            "SELECT abi_json FROM abi ORDER BY relevance ASC, id ASC",
        )
        .fetch(pool)
    }

    /// ABI documents created strictly after `when` with their creation
    /// timestamps, the oldest first.
    pub fn stream_created_after(
        pool: &PgPool,
        when: DateTime<Utc>,
    ) -> BoxStream<'_, sqlx::Result<(DateTime<Utc>, Value)>> {
        sqlx::query_as::<_, (DateTime<Utc>, Value)>(
            "SELECT created, abi_json FROM abi WHERE created > $1 ORDER BY created ASC",
        )
        .bind(when)
        .fetch(pool)
    }

    /// Creation timestamp of the most recently inserted ABI, `None` when the
    /// table is empty.
    pub async fn last_created(pool: &PgPool) -> sqlx::Result<Option<DateTime<Utc>>> {
        sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT created FROM abi ORDER BY created DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await
    }
}

/// Optional grouping for contracts.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub logo_file: String,
}

impl Project {
    /// The projects with the given ids, for joining onto a page of
    /// contracts.
    pub async fn get_by_ids(pool: &PgPool, ids: &[i64]) -> sqlx::Result<Vec<Self>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Self>("SELECT * FROM project WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}

/// A contract observed on some chain. Created lazily by the metadata
/// pipeline and never deleted by it.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Contract {
    pub id: i64,
    pub address: Vec<u8>,
    pub chain_id: i64,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub trusted_for_delegate_call: bool,
    pub implementation: Option<Vec<u8>>,
    pub fetch_retries: i32,
    pub abi_id: Option<i64>,
    pub project_id: Option<i64>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Contract {
    pub async fn get(
        pool: &PgPool,
        address: &[u8],
        chain_id: i64,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM contract WHERE address = $1 AND chain_id = $2 LIMIT 1",
        )
        .bind(address)
        .bind(chain_id)
        .fetch_optional(pool)
        .await
    }

    /// Fetch the `(address, chain_id)` row, creating an empty one when
    /// absent. The unique constraint serializes concurrent creators.
    pub async fn get_or_create(
        pool: &PgPool,
        address: &[u8],
        chain_id: i64,
    ) -> sqlx::Result<(Self, bool)> {
        if let Some(contract) = Self::get(pool, address, chain_id).await? {
            return Ok((contract, false));
        }

        let inserted = sqlx::query_as::<_, Self>(
            "INSERT INTO contract (address, chain_id) VALUES ($1, $2) \
             ON CONFLICT (address, chain_id) DO NOTHING RETURNING *",
        )
        .bind(address)
        .bind(chain_id)
        .fetch_optional(pool)
        .await?;
        match inserted {
            Some(contract) => Ok((contract, true)),
            None => {
                let contract = Self::get(pool, address, chain_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((contract, false))
            }
        }
    }

    /// Persist the mutable metadata fields of this row.
    pub async fn save(&self, pool: &PgPool) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE contract SET name = $2, display_name = $3, description = $4, \
             trusted_for_delegate_call = $5, implementation = $6, fetch_retries = $7, \
             abi_id = $8, project_id = $9, modified = now() WHERE id = $1",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.display_name)
        .bind(&self.description)
        .bind(self.trusted_for_delegate_call)
        .bind(&self.implementation)
        .bind(self.fetch_retries)
        .bind(self.abi_id)
        .bind(self.project_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// The ABI document for an address. With a `chain_id` the lookup is
    /// exact; without one, candidates are ordered by ascending `chain_id`
    /// and the first wins.
    pub async fn abi_json_for(
        pool: &PgPool,
        address: &[u8],
        chain_id: Option<i64>,
    ) -> sqlx::Result<Option<Value>> {
        match chain_id {
            Some(chain_id) => {
                sqlx::query_scalar::<_, Value>(
                    "SELECT abi.abi_json FROM contract \
                     JOIN abi ON contract.abi_id = abi.id \
                     WHERE contract.address = $1 AND contract.chain_id = $2 LIMIT 1",
                )
                .bind(address)
                .bind(chain_id)
                .fetch_optional(pool)
                .await
            }
            None => {
                sqlx::query_scalar::<_, Value>(
                    "SELECT abi.abi_json FROM contract \
                     JOIN abi ON contract.abi_id = abi.id \
                     WHERE contract.address = $1 ORDER BY contract.chain_id ASC LIMIT 1",
                )
                .bind(address)
                .fetch_optional(pool)
                .await
            }
        }
    }

    /// Whether any chain knows an ABI for the address.
    pub async fn has_abi_on_any_chain(pool: &PgPool, address: &[u8]) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM contract \
             WHERE address = $1 AND abi_id IS NOT NULL)",
        )
        .bind(address)
        .fetch_one(pool)
        .await
    }

    /// Contracts still missing an ABI with a remaining retry budget,
    /// streamed with a server-side cursor.
    pub fn stream_without_abi(
        pool: &PgPool,
        max_retries: i32,
    ) -> BoxStream<'_, sqlx::Result<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM contract WHERE abi_id IS NULL AND fetch_retries <= $1",
        )
        .bind(max_retries)
        .fetch(pool)
    }

    /// All contracts with a known proxy implementation address.
    pub fn stream_proxies(pool: &PgPool) -> BoxStream<'_, sqlx::Result<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM contract WHERE implementation IS NOT NULL",
        )
        .fetch(pool)
    }

    /// Update the descriptive metadata of an address across every chain.
    /// Returns the number of affected rows.
    pub async fn update_info(
        pool: &PgPool,
        address: &[u8],
        name: &str,
        display_name: &str,
        trusted_for_delegate_call: bool,
    ) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE contract SET name = $2, display_name = $3, \
             trusted_for_delegate_call = $4, modified = now() WHERE address = $1",
        )
        .bind(address)
        .bind(name)
        .bind(display_name)
        .bind(trusted_for_delegate_call)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Filterable listing query for the API surface.
///
/// Renders two statements from the same filters: the page query ordered by
/// `(address, chain_id)`, and the count query, which wraps the unordered
/// select in `SELECT COUNT(*) FROM (…)`.
#[derive(Debug, Clone, Default)]
pub struct ContractQuery {
    pub address: Option<Vec<u8>>,
    pub chain_ids: Option<Vec<i64>>,
    pub trusted_for_delegate_call: Option<bool>,
    pub only_with_abi: bool,
}

impl ContractQuery {
    fn push_filters(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");
        if let Some(address) = &self.address {
            builder.push(" AND address = ").push_bind(address.clone());
        }
        if let Some(chain_ids) = &self.chain_ids {
            builder.push(" AND chain_id = ANY(").push_bind(chain_ids.clone()).push(")");
        }
        if let Some(trusted) = self.trusted_for_delegate_call {
            builder.push(" AND trusted_for_delegate_call = ").push_bind(trusted);
        }
        if self.only_with_abi {
            builder.push(" AND abi_id IS NOT NULL");
        }
    }

    pub async fn fetch_page(
        &self,
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<Contract>> {
        let mut builder = QueryBuilder::new("SELECT * FROM contract");
        self.push_filters(&mut builder);
        builder.push(" ORDER BY address, chain_id");
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);
        builder.build_query_as::<Contract>().fetch_all(pool).await
    }

    pub async fn count(&self, pool: &PgPool) -> sqlx::Result<i64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM (SELECT id FROM contract");
        self.push_filters(&mut builder);
        builder.push(") AS filtered");
        builder.build_query_scalar::<i64>().fetch_one(pool).await
    }
}
