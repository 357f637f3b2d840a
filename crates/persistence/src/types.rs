//! Scan record types shared between the orchestrator and the result store.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a scan as observed by pollers.
///
/// `NotFound` is synthesized on the read path when a scan id cannot be
/// resolved in either cache layer; it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Initiated,
    Scanning,
    Partial,
    Complete,
    Failed,
    NotFound,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Scanning => "scanning",
            Self::Partial => "partial",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
        }
    }

    /// Terminal records are immutable except for TTL-driven expiry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Terminal outcome of one strategy within a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

/// Per-strategy result bookkeeping within a ScanRecord.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub outcome: StrategyOutcome,
    pub opportunities_found: u32,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// What the signal suggests the user do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Buy,
    Sell,
    Hold,
    Watch,
}

/// Signal category. `MarketWatch` is reserved for fallback-tier
/// opportunities emitted when no strategy produced a qualifying signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityCategory {
    Momentum,
    MeanReversion,
    Breakout,
    VolumeSurge,
    RiskManagement,
    MarketWatch,
}

/// A discovered trading opportunity.
///
/// Price-shaped fields are `Option` on purpose: "unknown" and "zero" are
/// different answers, and upstream payloads may carry explicit nulls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: String,
    pub strategy_id: String,
    pub category: OpportunityCategory,
    /// Signal strength on a 0-100 scale.
    pub confidence: Decimal,
    pub action: SuggestedAction,
    pub profit_potential_pct: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub target_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    /// True only for market-watch opportunities, never for strategy signals.
    #[serde(default)]
    pub fallback: bool,
    /// Free-form strategy-specific payload.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// The mutable unit of scan state, visible to pollers from the instant the
/// scan is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: String,
    pub cache_key: String,
    pub user_id: String,
    pub state: ScanState,
    pub strategies_total: u32,
    pub strategies_completed: u32,
    /// Discovery order, not rank. Callers needing ranked output sort
    /// client-side.
    pub opportunities: Vec<Opportunity>,
    pub strategy_performance: BTreeMap<String, StrategyPerformance>,
    /// Result cap requested at scan start; applied on the read path so the
    /// stored record stays complete.
    pub result_limit: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ScanRecord {
    /// Build the placeholder written synchronously at scan acceptance.
    pub fn placeholder(
        scan_id: impl Into<String>,
        cache_key: impl Into<String>,
        user_id: impl Into<String>,
        strategies_total: u32,
        result_limit: Option<u32>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            scan_id: scan_id.into(),
            cache_key: cache_key.into(),
            user_id: user_id.into(),
            state: ScanState::Initiated,
            strategies_total,
            strategies_completed: 0,
            opportunities: Vec::new(),
            strategy_performance: BTreeMap::new(),
            result_limit,
            started_at: now,
            last_updated_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Sliding expiry: every write refreshes the TTL window.
    pub fn touch(&mut self, ttl: Duration) {
        let now = Utc::now();
        self.last_updated_at = now;
        self.expires_at =
            now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_starts_initiated_and_empty() {
        let rec = ScanRecord::placeholder("s1", "k1", "u1", 5, None, Duration::from_secs(300));
        assert_eq!(rec.state, ScanState::Initiated);
        assert_eq!(rec.strategies_total, 5);
        assert_eq!(rec.strategies_completed, 0);
        assert!(rec.opportunities.is_empty());
        assert!(rec.expires_at > rec.started_at);
    }

    #[test]
    fn terminal_states() {
        assert!(ScanState::Complete.is_terminal());
        assert!(ScanState::Failed.is_terminal());
        assert!(!ScanState::Partial.is_terminal());
        assert!(!ScanState::Initiated.is_terminal());
    }

    #[test]
    fn touch_extends_expiry() {
        let mut rec = ScanRecord::placeholder("s1", "k1", "u1", 1, None, Duration::from_secs(1));
        let before = rec.expires_at;
        rec.touch(Duration::from_secs(300));
        assert!(rec.expires_at > before);
    }

    #[test]
    fn opportunity_nullable_fields_round_trip() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "strategy_id": "momentum",
            "category": "momentum",
            "confidence": "72.5",
            "action": "buy",
            "profit_potential_pct": null,
            "entry_price": "42000.5",
            "target_price": null,
            "stop_loss": null
        }"#;
        let opp: Opportunity = serde_json::from_str(json).unwrap();
        assert_eq!(opp.profit_potential_pct, None);
        assert!(opp.entry_price.is_some());
        assert!(!opp.fallback);
    }
}
