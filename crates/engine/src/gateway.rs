//! Scan status gateway — the read path for polling clients
//!
//! Reads go through the store's two-layer resolution, so a poll landing on
//! a worker that never executed the scan is served from the durable layer.
//! The gateway never blocks on scan completion and exposes exactly one
//! error shape to pollers: a synthetic `not_found` state, reachable only
//! when a lookup resolves in neither cache layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use persistence::{Opportunity, ScanRecord, ScanState, ScanStore, StrategyPerformance};

/// Snapshot of a scan as returned to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub scan_id: String,
    pub state: ScanState,
    pub strategies_completed: u32,
    pub strategies_total: u32,
    pub opportunities: Vec<Opportunity>,
    pub strategy_performance: BTreeMap<String, StrategyPerformance>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl StatusResponse {
    fn from_record(record: ScanRecord) -> Self {
        let mut opportunities = record.opportunities;
        if let Some(limit) = record.result_limit {
            opportunities.truncate(limit as usize);
        }
        Self {
            scan_id: record.scan_id,
            state: record.state,
            strategies_completed: record.strategies_completed,
            strategies_total: record.strategies_total,
            opportunities,
            strategy_performance: record.strategy_performance,
            started_at: Some(record.started_at),
            last_updated_at: Some(record.last_updated_at),
        }
    }

    fn not_found(scan_id: &str) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            state: ScanState::NotFound,
            strategies_completed: 0,
            strategies_total: 0,
            opportunities: Vec::new(),
            strategy_performance: BTreeMap::new(),
            started_at: None,
            last_updated_at: None,
        }
    }
}

pub struct ScanStatusGateway {
    store: Arc<ScanStore>,
}

impl ScanStatusGateway {
    pub fn new(store: Arc<ScanStore>) -> Self {
        Self { store }
    }

    /// Current state of a scan, including mid-flight partial results.
    pub async fn status(&self, scan_id: &str) -> StatusResponse {
        let Some(cache_key) = self.store.resolve_scan(scan_id).await else {
            debug!(scan_id, "Scan lookup unresolvable in both layers");
            return StatusResponse::not_found(scan_id);
        };
        match self.store.get(&cache_key).await {
            Some(record) => StatusResponse::from_record(record),
            None => StatusResponse::not_found(scan_id),
        }
    }

    /// Latest scan for a user, resolved via the user index — no scan id
    /// required (the conversational layer polls this way).
    pub async fn latest_for_user(&self, user_id: &str) -> StatusResponse {
        let Some(cache_key) = self.store.resolve_latest(user_id).await else {
            return StatusResponse::not_found("");
        };
        match self.store.get(&cache_key).await {
            Some(record) => StatusResponse::from_record(record),
            None => StatusResponse::not_found(""),
        }
    }
}
