//! PostgreSQL-backed durable tier.
//!
//! Backed by the `upstream_cache` and `missing_searches` tables. Both are
//! UNLOGGED: losing them on crash recovery only costs a few upstream calls.

use crate::cache::durable::{
    DurableRecord, DurableStore, MISSING_FLAG_THRESHOLD, MissingQueryRecord, StoreError,
};
use crate::cache::key::sanitize_key;
use crate::cache::payload::Payload;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete records past their expiry. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM upstream_cache WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DurableStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<DurableRecord>, StoreError> {
        let row: Option<(Json<Payload>, DateTime<Utc>, bool)> = sqlx::query_as(
            "SELECT payload, expires_at, has_results FROM upstream_cache WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(Json(payload), expires_at, has_results)| DurableRecord {
            payload,
            expires_at,
            has_results,
        }))
    }

    async fn put(&self, key: &str, record: &DurableRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO upstream_cache (key, payload, expires_at, has_results)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key)
            DO UPDATE SET
                payload = EXCLUDED.payload,
                expires_at = EXCLUDED.expires_at,
                has_results = EXCLUDED.has_results,
                updated_at = now()
            "#,
        )
        .bind(key)
        .bind(Json(&record.payload))
        .bind(record.expires_at)
        .bind(record.has_results)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_missing(
        &self,
        query: &str,
        at: DateTime<Utc>,
    ) -> Result<MissingQueryRecord, StoreError> {
        let threshold = i32::try_from(MISSING_FLAG_THRESHOLD).unwrap_or(i32::MAX);
        let (query, count, last_requested_at, flagged): (String, i32, DateTime<Utc>, bool) =
            sqlx::query_as(
                r#"
                INSERT INTO missing_searches (key, query, count, last_requested_at, flagged)
                VALUES ($1, $2, 1, $3, 1 >= $4)
                ON CONFLICT (key)
                DO UPDATE SET
                    count = missing_searches.count + 1,
                    last_requested_at = EXCLUDED.last_requested_at,
                    flagged = missing_searches.count + 1 >= $4
                RETURNING query, count, last_requested_at, flagged
                "#,
            )
            .bind(sanitize_key(query))
            .bind(query)
            .bind(at)
            .bind(threshold)
            .fetch_one(&self.pool)
            .await?;

        Ok(MissingQueryRecord {
            query,
            count: u32::try_from(count).unwrap_or(0),
            last_requested_at,
            flagged,
        })
    }
}
