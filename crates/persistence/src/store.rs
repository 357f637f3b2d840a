//! Dual-layer scan result store.
//!
//! Composes the in-process [`FastCache`] with the durable SQLite tables in a
//! read-through/write-through pattern. The durable layer is the source of
//! truth across worker processes; the fast layer only shortens the hot path
//! for the worker that happens to hold the entry.
//!
//! All scan mutations go through [`ScanStore::merge`], which serializes
//! writers and expresses every update as an in-place transformation of the
//! current record — append, increment, upsert — so concurrently completing
//! strategies can never clobber each other's results.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::fast::FastCache;
use crate::repository::scan::ScanRepository;
use crate::types::ScanRecord;
use crate::{Database, DbResult};

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct ScanStore {
    pool: SqlitePool,
    records: FastCache<ScanRecord>,
    scan_keys: FastCache<String>,
    user_keys: FastCache<String>,
    /// Serializes merges and unregistration within this process.
    write_lock: Mutex<()>,
    ttl: Duration,
}

impl ScanStore {
    pub fn new(db: &Database, ttl: Duration) -> Self {
        Self {
            pool: db.pool_clone(),
            records: FastCache::new(),
            scan_keys: FastCache::new(),
            user_keys: FastCache::new(),
            write_lock: Mutex::new(()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a new scan: placeholder record plus both lookup indices.
    ///
    /// Unlike later updates this write is strict — another worker must be
    /// able to serve the very first poll from the durable layer, so a
    /// durable failure here fails scan creation rather than degrading.
    pub async fn register_scan(&self, record: &ScanRecord) -> DbResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut record = record.clone();
        record.touch(self.ttl);
        let expires_ms = record.expires_at.timestamp_millis();

        let repo = ScanRepository::new(&self.pool);
        repo.upsert_record(&record).await?;
        repo.upsert_scan_lookup(&record.scan_id, &record.cache_key, expires_ms)
            .await?;
        repo.upsert_user_lookup(&record.user_id, &record.cache_key, expires_ms)
            .await?;

        self.populate_fast(&record);
        debug!(scan_id = %record.scan_id, cache_key = %record.cache_key, "Scan registered");
        Ok(())
    }

    /// Apply an atomic transformation to the record behind `cache_key`.
    ///
    /// Returns the record as stored after the call, or `None` when no live
    /// record exists. A terminal record is returned unchanged — late
    /// straggler results must not reopen a finalized scan.
    pub async fn merge<F>(&self, cache_key: &str, f: F) -> Option<ScanRecord>
    where
        F: FnOnce(&mut ScanRecord),
    {
        let _guard = self.write_lock.lock().await;

        let mut record = self.load(cache_key).await?;
        if record.is_terminal() {
            debug!(cache_key, state = record.state.as_str(), "Merge refused on terminal record");
            return Some(record);
        }

        f(&mut record);
        record.touch(self.ttl);
        self.write_through(&record).await;
        Some(record)
    }

    /// Fetch the record for a cache slot, repopulating the fast layer from
    /// the durable layer on a miss (read-through).
    pub async fn get(&self, cache_key: &str) -> Option<ScanRecord> {
        self.load(cache_key).await
    }

    /// Resolve `scan_id -> cache_key` through both layers.
    pub async fn resolve_scan(&self, scan_id: &str) -> Option<String> {
        if let Some(key) = self.scan_keys.get(scan_id) {
            return Some(key);
        }
        let repo = ScanRepository::new(&self.pool);
        match repo.get_scan_lookup(scan_id, now_ms()).await {
            Ok(Some(key)) => {
                self.scan_keys.insert(scan_id, key.clone(), self.ttl);
                Some(key)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(scan_id, error = %e, "Durable scan lookup failed; fast layer only");
                None
            }
        }
    }

    /// Resolve `user_id -> cache_key` of the user's latest scan.
    pub async fn resolve_latest(&self, user_id: &str) -> Option<String> {
        if let Some(key) = self.user_keys.get(user_id) {
            return Some(key);
        }
        let repo = ScanRepository::new(&self.pool);
        match repo.get_user_lookup(user_id, now_ms()).await {
            Ok(Some(key)) => {
                self.user_keys.insert(user_id, key.clone(), self.ttl);
                Some(key)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(user_id, error = %e, "Durable user lookup failed; fast layer only");
                None
            }
        }
    }

    /// Remove the lookup entries for a scan, but only once the record they
    /// point at is confirmed absent in *both* layers. Removing a lookup
    /// while the record is live anywhere would orphan a record another
    /// worker is still serving, so this refuses (returns `false`) instead.
    pub async fn unregister(&self, scan_id: &str) -> DbResult<bool> {
        let _guard = self.write_lock.lock().await;

        let repo = ScanRepository::new(&self.pool);
        let cache_key = match self.scan_keys.get(scan_id) {
            Some(key) => Some(key),
            None => repo.get_scan_lookup_any(scan_id).await?,
        };
        let Some(cache_key) = cache_key else {
            // Nothing points anywhere; already unregistered.
            return Ok(true);
        };

        if self.records.get(&cache_key).is_some() {
            return Ok(false);
        }
        if repo.record_live(&cache_key, now_ms()).await? {
            return Ok(false);
        }

        repo.delete_scan_lookup(scan_id).await?;
        repo.delete_user_lookups_for(&cache_key).await?;
        self.scan_keys.remove(scan_id);
        self.user_keys.remove_by_value(&cache_key);
        Ok(true)
    }

    /// Drop expired records and lookups from both layers. Returns the
    /// number of durable rows removed.
    pub async fn purge_expired(&self) -> DbResult<u64> {
        let repo = ScanRepository::new(&self.pool);
        let removed = repo.purge_expired(now_ms()).await?;
        self.records.purge_expired();
        self.scan_keys.purge_expired();
        self.user_keys.purge_expired();
        Ok(removed)
    }

    /// Empty the fast layer. Reads afterwards exercise the durable
    /// read-through path exactly as they would on a worker process that
    /// never saw the original write.
    pub fn clear_fast(&self) {
        self.records.clear();
        self.scan_keys.clear();
        self.user_keys.clear();
    }

    async fn load(&self, cache_key: &str) -> Option<ScanRecord> {
        if let Some(record) = self.records.get(cache_key) {
            return Some(record);
        }
        let repo = ScanRepository::new(&self.pool);
        match repo.get_record(cache_key, now_ms()).await {
            Ok(Some(record)) => {
                self.populate_fast(&record);
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(cache_key, error = %e, "Durable read failed; fast layer only");
                None
            }
        }
    }

    /// Write to both layers; a durable failure degrades to fast-layer-only
    /// for this write rather than losing the update entirely.
    async fn write_through(&self, record: &ScanRecord) {
        self.populate_fast(record);

        let repo = ScanRepository::new(&self.pool);
        let expires_ms = record.expires_at.timestamp_millis();
        if let Err(e) = repo.upsert_record(record).await {
            warn!(
                cache_key = %record.cache_key,
                error = %e,
                "Durable record write failed; serving from fast layer until it recovers"
            );
            return;
        }
        // Lookup TTLs slide together with the record they point at.
        if let Err(e) = repo
            .upsert_scan_lookup(&record.scan_id, &record.cache_key, expires_ms)
            .await
        {
            warn!(scan_id = %record.scan_id, error = %e, "Durable scan lookup refresh failed");
        }
        if let Err(e) = repo
            .upsert_user_lookup(&record.user_id, &record.cache_key, expires_ms)
            .await
        {
            warn!(user_id = %record.user_id, error = %e, "Durable user lookup refresh failed");
        }
    }

    /// Mirror a record and its lookups into the fast layer, bounded by the
    /// record's remaining lifetime rather than a fresh TTL window.
    fn populate_fast(&self, record: &ScanRecord) {
        let remaining = (record.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return;
        }
        self.records
            .insert(&record.cache_key, record.clone(), remaining);
        self.scan_keys
            .insert(&record.scan_id, record.cache_key.clone(), remaining);
        self.user_keys
            .insert(&record.user_id, record.cache_key.clone(), remaining);
    }
}
