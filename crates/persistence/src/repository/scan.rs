//! Durable layer for scan records and their lookup indices.
//!
//! This is the cross-process source of truth: the in-process fast cache in
//! `store` is a latency optimization layered on top of these tables.

use sqlx::SqlitePool;

use crate::types::ScanRecord;
use crate::{DbError, DbResult};

/// Repository for scan records and the two secondary lookup indices
/// (`scan_id -> cache_key`, `user_id -> cache_key`).
pub struct ScanRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ScanRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the record for a cache slot. Every write carries
    /// a refreshed `expires_at` (sliding expiry).
    pub async fn upsert_record(&self, record: &ScanRecord) -> DbResult<()> {
        let body = serde_json::to_string(record)
            .map_err(|e| DbError::Query(format!("record serialization failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO scan_records (
                cache_key, scan_id, user_id, state, record,
                started_at, last_updated_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                scan_id = excluded.scan_id,
                user_id = excluded.user_id,
                state = excluded.state,
                record = excluded.record,
                started_at = excluded.started_at,
                last_updated_at = excluded.last_updated_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&record.cache_key)
        .bind(&record.scan_id)
        .bind(&record.user_id)
        .bind(record.state.as_str())
        .bind(&body)
        .bind(record.started_at.timestamp_millis())
        .bind(record.last_updated_at.timestamp_millis())
        .bind(record.expires_at.timestamp_millis())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a record by cache key. Expired rows are treated as absent.
    pub async fn get_record(&self, cache_key: &str, now_ms: i64) -> DbResult<Option<ScanRecord>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT record FROM scan_records WHERE cache_key = ? AND expires_at > ?",
        )
        .bind(cache_key)
        .bind(now_ms)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some((body,)) => {
                let record = serde_json::from_str(&body)
                    .map_err(|e| DbError::Query(format!("record deserialization failed: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// True if a live (non-expired) record occupies the cache slot.
    pub async fn record_live(&self, cache_key: &str, now_ms: i64) -> DbResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM scan_records WHERE cache_key = ? AND expires_at > ?",
        )
        .bind(cache_key)
        .bind(now_ms)
        .fetch_one(self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn delete_record(&self, cache_key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM scan_records WHERE cache_key = ?")
            .bind(cache_key)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert_scan_lookup(
        &self,
        scan_id: &str,
        cache_key: &str,
        expires_at_ms: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scan_lookup (scan_id, cache_key, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(scan_id) DO UPDATE SET
                cache_key = excluded.cache_key,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(scan_id)
        .bind(cache_key)
        .bind(expires_at_ms)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_user_lookup(
        &self,
        user_id: &str,
        cache_key: &str,
        expires_at_ms: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_latest (user_id, cache_key, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                cache_key = excluded.cache_key,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(user_id)
        .bind(cache_key)
        .bind(expires_at_ms)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Resolve `scan_id -> cache_key`, ignoring expired entries.
    pub async fn get_scan_lookup(&self, scan_id: &str, now_ms: i64) -> DbResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT cache_key FROM scan_lookup WHERE scan_id = ? AND expires_at > ?",
        )
        .bind(scan_id)
        .bind(now_ms)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(k,)| k))
    }

    /// Resolve `scan_id -> cache_key` even when the entry has expired.
    /// Used by unregister, which must find the slot a lookup points at
    /// before it is allowed to delete the lookup.
    pub async fn get_scan_lookup_any(&self, scan_id: &str) -> DbResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT cache_key FROM scan_lookup WHERE scan_id = ?")
                .bind(scan_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(row.map(|(k,)| k))
    }

    /// Resolve `user_id -> cache_key` of the user's latest scan.
    pub async fn get_user_lookup(&self, user_id: &str, now_ms: i64) -> DbResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT cache_key FROM user_latest WHERE user_id = ? AND expires_at > ?",
        )
        .bind(user_id)
        .bind(now_ms)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(k,)| k))
    }

    pub async fn delete_scan_lookup(&self, scan_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM scan_lookup WHERE scan_id = ?")
            .bind(scan_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Remove user-latest entries pointing at a cache slot that no longer
    /// holds a live record.
    pub async fn delete_user_lookups_for(&self, cache_key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM user_latest WHERE cache_key = ?")
            .bind(cache_key)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete every expired record and lookup entry. Returns rows removed.
    pub async fn purge_expired(&self, now_ms: i64) -> DbResult<u64> {
        let mut removed = 0u64;
        for table in ["scan_records", "scan_lookup", "user_latest"] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE expires_at <= ?"))
                .bind(now_ms)
                .execute(self.pool)
                .await?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }
}
