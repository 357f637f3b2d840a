//! Database schema definitions

/// SQL to create all tables
/// NOTE: The full scan record is stored as a JSON document in the `record`
/// column; the remaining columns exist for lookup resolution and TTL sweeps.
/// Timestamps are unix epoch milliseconds.
pub const CREATE_TABLES: &str = r#"
-- Scan results, one row per cache slot (latest scan for a user+params slot)
CREATE TABLE IF NOT EXISTS scan_records (
    cache_key TEXT PRIMARY KEY,
    scan_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    state TEXT NOT NULL,
    record TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    last_updated_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);

-- Secondary lookup: scan_id -> cache_key
CREATE TABLE IF NOT EXISTS scan_lookup (
    scan_id TEXT PRIMARY KEY,
    cache_key TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

-- Secondary lookup: user_id -> cache_key of that user's latest scan
CREATE TABLE IF NOT EXISTS user_latest (
    user_id TEXT PRIMARY KEY,
    cache_key TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_scan_records_expiry ON scan_records(expires_at);
CREATE INDEX IF NOT EXISTS idx_scan_records_scan_id ON scan_records(scan_id);
CREATE INDEX IF NOT EXISTS idx_scan_lookup_expiry ON scan_lookup(expires_at);
CREATE INDEX IF NOT EXISTS idx_scan_lookup_key ON scan_lookup(cache_key);
CREATE INDEX IF NOT EXISTS idx_user_latest_expiry ON user_latest(expires_at);
CREATE INDEX IF NOT EXISTS idx_user_latest_key ON user_latest(cache_key)
"#;
