//! Scan orchestration tunables

use std::time::Duration;

/// Budgets and limits for a discovery scan.
///
/// The overall budget is deliberately tighter than the per-strategy cap:
/// the aggregate scan must not overrun its SLA even when individual
/// strategies are each allowed generous time. Every strategy receives
/// `min(strategy_budget, overall_deadline - now)`, recomputed when it
/// starts, so early finishers leave more room for later ones.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Wall-clock deadline for the whole scan.
    pub overall_budget: Duration,
    /// Cap on any single strategy evaluation.
    pub strategy_budget: Duration,
    /// Concurrent strategy evaluations (protects shared price feeds).
    pub max_concurrency: usize,
    /// Market-watch opportunities emitted when no strategy signal qualifies.
    pub fallback_count: usize,
    /// Sliding TTL for scan records and lookup entries.
    pub result_ttl: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            overall_budget: Duration::from_secs(150),
            strategy_budget: Duration::from_secs(180),
            max_concurrency: 4,
            fallback_count: 3,
            result_ttl: Duration::from_secs(300),
        }
    }
}

impl ScanConfig {
    /// Load overrides from `OPP_SCAN_*` environment variables, falling back
    /// to the defaults above for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        fn secs(var: &str, fallback: Duration) -> Duration {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        }
        fn count(var: &str, fallback: usize) -> usize {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(fallback)
        }

        Self {
            overall_budget: secs("OPP_SCAN_OVERALL_BUDGET_SECS", defaults.overall_budget),
            strategy_budget: secs("OPP_SCAN_STRATEGY_BUDGET_SECS", defaults.strategy_budget),
            max_concurrency: count("OPP_SCAN_MAX_CONCURRENCY", defaults.max_concurrency),
            fallback_count: count("OPP_SCAN_FALLBACK_COUNT", defaults.fallback_count),
            result_ttl: secs("OPP_SCAN_RESULT_TTL_SECS", defaults.result_ttl),
        }
    }
}
