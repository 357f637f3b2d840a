//! Scan orchestrator — owns the lifecycle of one discovery scan
//!
//! `start_scan` does O(1) synchronous bookkeeping (eligibility, cache key,
//! lookup registration, placeholder write) and returns a scan id without
//! waiting on any strategy. The fan-out runs as a detached task: bounded
//! concurrency, a shared wall-clock deadline tighter than the per-strategy
//! cap, and one atomic store merge per strategy completion. Results flow
//! exclusively through the store — pollers on any worker read them from
//! there, never from this task.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

use persistence::{
    Opportunity, OpportunityCategory, ScanRecord, ScanState, ScanStore, StrategyOutcome,
    StrategyPerformance, SuggestedAction,
};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::ingest;
use crate::strategies::{
    EntitlementProvider, EvaluatorContext, StrategyEvaluator, StrategyRegistry,
};
use crate::types::ScanRequest;
use crate::universe::{AssetUniverse, AssetUniverseProvider};

pub struct ScanOrchestrator {
    store: Arc<ScanStore>,
    registry: Arc<StrategyRegistry>,
    entitlements: Arc<dyn EntitlementProvider>,
    universe: Arc<dyn AssetUniverseProvider>,
    config: ScanConfig,
}

impl ScanOrchestrator {
    pub fn new(
        store: Arc<ScanStore>,
        registry: Arc<StrategyRegistry>,
        entitlements: Arc<dyn EntitlementProvider>,
        universe: Arc<dyn AssetUniverseProvider>,
        config: ScanConfig,
    ) -> Self {
        Self {
            store,
            registry,
            entitlements,
            universe,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Accept a scan and schedule its fan-out.
    ///
    /// On return the placeholder record and both lookup entries exist, so a
    /// status poll for the returned scan id can never see `not_found`
    /// before the record's TTL genuinely expires.
    pub async fn start_scan(&self, request: ScanRequest) -> Result<String, ScanError> {
        let eligible = self
            .registry
            .eligible_for(&request.user_id, self.entitlements.as_ref());
        if eligible.is_empty() {
            return Err(ScanError::NoEligibleStrategies);
        }

        let universe = self
            .universe
            .universe(&request.user_id)
            .await
            .map_err(|e| ScanError::UniverseUnavailable(e.to_string()))?;

        let cache_key = request.cache_key();

        // A live scan for the same slot is reused unless the caller forces
        // a refresh; a forced refresh keeps the cache key and overwrites
        // the slot under a fresh scan id.
        if !request.force_refresh {
            if let Some(existing) = self.store.get(&cache_key).await {
                if !existing.is_terminal() {
                    info!(
                        scan_id = %existing.scan_id,
                        user = %request.user_id,
                        "Scan already in flight for this slot; reusing"
                    );
                    return Ok(existing.scan_id);
                }
            }
        }

        let scan_id = generate_scan_id();
        let placeholder = ScanRecord::placeholder(
            scan_id.as_str(),
            cache_key.as_str(),
            request.user_id.as_str(),
            eligible.len() as u32,
            request.limit,
            self.config.result_ttl,
        );
        self.store.register_scan(&placeholder).await?;

        info!(
            scan_id = %scan_id,
            user = %request.user_id,
            strategies = eligible.len(),
            universe = universe.len(),
            "Scan accepted"
        );

        let store = self.store.clone();
        let config = self.config.clone();
        let fan_out_id = scan_id.clone();
        tokio::spawn(async move {
            run_fan_out(store, fan_out_id, eligible, universe, request, cache_key, config).await;
        });

        Ok(scan_id)
    }
}

fn generate_scan_id() -> String {
    let nonce: u64 = rand::random();
    format!(
        "scan-{}-{:012x}",
        Utc::now().timestamp_millis(),
        nonce & 0xffff_ffff_ffff
    )
}

/// Background fan-out: evaluate every eligible strategy under the shared
/// budget, merging into the store as each one finishes.
async fn run_fan_out(
    store: Arc<ScanStore>,
    scan_id: String,
    strategies: Vec<(String, Arc<dyn StrategyEvaluator>)>,
    universe: AssetUniverse,
    request: ScanRequest,
    cache_key: String,
    config: ScanConfig,
) {
    let deadline = Instant::now() + config.overall_budget;
    let strategy_ids: Vec<String> = strategies.iter().map(|(id, _)| id.clone()).collect();

    // Every merge below is guarded by scan id: a forced refresh replaces
    // the slot under a new id, and a stale fan-out must not write into the
    // record that replaced its own.
    let transition = {
        let scan_id = scan_id.clone();
        store
            .merge(&cache_key, move |r| {
                if r.scan_id == scan_id {
                    r.state = ScanState::Scanning;
                }
            })
            .await
    };
    match transition {
        None => {
            warn!(cache_key = %cache_key, "Placeholder record missing at fan-out start; aborting scan");
            return;
        }
        Some(r) if r.scan_id != scan_id => {
            info!(cache_key = %cache_key, "Slot overwritten by a newer scan before fan-out; aborting");
            return;
        }
        Some(_) => {}
    }

    let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
    let mut tasks: JoinSet<()> = JoinSet::new();

    for (strategy_id, evaluator) in strategies {
        let store = store.clone();
        let semaphore = semaphore.clone();
        let universe = universe.clone();
        let scan_id = scan_id.clone();
        let cache_key = cache_key.clone();
        let user_id = request.user_id.clone();
        let risk_tolerance = request.risk_tolerance;
        let min_confidence = request.min_confidence;
        let strategy_budget = config.strategy_budget;

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };

            // Remaining budget, recomputed now that a slot is free: early
            // finishers leave more time for later strategies.
            let budget = strategy_budget.min(deadline.saturating_duration_since(Instant::now()));
            if budget.is_zero() {
                record_completion(
                    &store,
                    &scan_id,
                    &cache_key,
                    &strategy_id,
                    StrategyOutcome::TimedOut,
                    0,
                    Some("overall scan deadline reached before start".to_string()),
                    Vec::new(),
                )
                .await;
                return;
            }

            let ctx = EvaluatorContext {
                user_id: user_id.clone(),
                risk_tolerance,
                universe,
                budget,
            };
            let started = Instant::now();
            let result = tokio::time::timeout(budget, evaluator.evaluate(&ctx)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(Ok(raw)) => {
                    let opportunities: Vec<Opportunity> = raw
                        .into_iter()
                        .map(|r| ingest::normalize(&strategy_id, r))
                        .filter(|o| min_confidence.map_or(true, |min| o.confidence >= min))
                        .collect();
                    info!(
                        strategy = %strategy_id,
                        user = %user_id,
                        found = opportunities.len(),
                        elapsed_ms,
                        "Strategy completed"
                    );
                    record_completion(
                        &store,
                        &scan_id,
                        &cache_key,
                        &strategy_id,
                        StrategyOutcome::Succeeded,
                        elapsed_ms,
                        None,
                        opportunities,
                    )
                    .await;
                }
                Ok(Err(e)) => {
                    warn!(
                        strategy = %strategy_id,
                        user = %user_id,
                        elapsed_ms,
                        error = %e,
                        "Strategy failed"
                    );
                    record_completion(
                        &store,
                        &scan_id,
                        &cache_key,
                        &strategy_id,
                        StrategyOutcome::Failed,
                        elapsed_ms,
                        Some(e.to_string()),
                        Vec::new(),
                    )
                    .await;
                }
                Err(_) => {
                    warn!(
                        strategy = %strategy_id,
                        user = %user_id,
                        elapsed_ms,
                        "Strategy exceeded its budget"
                    );
                    record_completion(
                        &store,
                        &scan_id,
                        &cache_key,
                        &strategy_id,
                        StrategyOutcome::TimedOut,
                        elapsed_ms,
                        Some(format!("exceeded budget of {}s", budget.as_secs())),
                        Vec::new(),
                    )
                    .await;
                }
            }
        });
    }

    // Wait for every strategy or the overall deadline, whichever first.
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, tasks.join_next()).await {
            Ok(Some(Ok(()))) => {}
            Ok(Some(Err(e))) => warn!(error = %e, "Strategy task aborted"),
            Ok(None) => break,
            Err(_) => {
                info!(cache_key = %cache_key, "Overall scan deadline reached; finalizing with partial results");
                break;
            }
        }
    }
    // Stragglers are no longer awaited but not killed. Any merge they
    // deliver after finalization is refused by the store.
    tasks.detach_all();

    finalize(&store, &scan_id, &cache_key, &strategy_ids, &universe, &config).await;
}

/// One atomic merge per strategy completion. Appends and upserts only —
/// concurrent completions must never clobber each other's results, and a
/// completion for a scan that no longer owns its slot is dropped.
async fn record_completion(
    store: &ScanStore,
    scan_id: &str,
    cache_key: &str,
    strategy_id: &str,
    outcome: StrategyOutcome,
    elapsed_ms: u64,
    error: Option<String>,
    opportunities: Vec<Opportunity>,
) {
    let found = opportunities.len() as u32;
    let id = strategy_id.to_string();
    let expected = scan_id.to_string();
    let merged = store
        .merge(cache_key, move |r| {
            if r.scan_id != expected {
                return;
            }
            r.strategies_completed += 1;
            r.opportunities.extend(opportunities);
            r.strategy_performance.insert(
                id,
                StrategyPerformance {
                    outcome,
                    opportunities_found: found,
                    elapsed_ms,
                    error,
                },
            );
            r.state = ScanState::Partial;
        })
        .await;
    if merged.is_none() {
        warn!(
            cache_key,
            strategy = strategy_id,
            "Scan record vanished before completion could be recorded"
        );
    }
}

/// Finalize the record: mark strategies never heard from as timed out,
/// inject market-watch fallbacks if nothing qualified, and seal the state.
async fn finalize(
    store: &ScanStore,
    scan_id: &str,
    cache_key: &str,
    strategy_ids: &[String],
    universe: &AssetUniverse,
    config: &ScanConfig,
) {
    let fallback = fallback_opportunities(universe, config.fallback_count);
    let ids: Vec<String> = strategy_ids.to_vec();
    let expected = scan_id.to_string();
    let overall_ms = config.overall_budget.as_millis() as u64;

    let finalized = store
        .merge(cache_key, move |r| {
            if r.scan_id != expected {
                return;
            }
            for id in ids {
                r.strategy_performance.entry(id).or_insert_with(|| {
                    StrategyPerformance {
                        outcome: StrategyOutcome::TimedOut,
                        opportunities_found: 0,
                        elapsed_ms: overall_ms,
                        error: Some("not finished before overall scan deadline".to_string()),
                    }
                });
            }

            let all_failed = !r.strategy_performance.is_empty()
                && r.strategy_performance
                    .values()
                    .all(|p| p.outcome == StrategyOutcome::Failed);

            if all_failed {
                // Every evaluator errored: a systemic fault, not a quiet
                // market. Fallback signals would only mask it.
                r.state = ScanState::Failed;
                return;
            }

            if r.opportunities.is_empty() {
                r.opportunities.extend(fallback);
            }
            r.state = ScanState::Complete;
        })
        .await;

    match finalized {
        Some(record) if record.scan_id == scan_id => info!(
            scan_id = %record.scan_id,
            state = record.state.as_str(),
            opportunities = record.opportunities.len(),
            completed = record.strategies_completed,
            total = record.strategies_total,
            "Scan finalized"
        ),
        Some(_) => info!(scan_id, cache_key, "Slot overwritten by a newer scan; stale finalization dropped"),
        None => warn!(cache_key, "Scan record vanished before finalization"),
    }
}

/// Low-priority market-watch entries from the highest-activity symbols,
/// emitted only when no strategy signal survived. Tagged so they can never
/// be mistaken for genuine strategy output.
fn fallback_opportunities(universe: &AssetUniverse, count: usize) -> Vec<Opportunity> {
    universe
        .most_active(count)
        .into_iter()
        .map(|activity| Opportunity {
            symbol: activity.symbol.clone(),
            strategy_id: "market_watch".to_string(),
            category: OpportunityCategory::MarketWatch,
            confidence: dec!(20),
            action: SuggestedAction::Watch,
            profit_potential_pct: None,
            entry_price: Some(activity.last_price),
            target_price: None,
            stop_loss: None,
            fallback: true,
            metadata: json!({
                "source": "market_watch",
                "quote_volume_24h": activity.quote_volume,
                "reason": "no qualifying strategy signals this scan",
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RawOpportunity;
    use crate::strategies::{FreeAccessOnly, StrategyTier};
    use crate::universe::{symbol, StaticUniverse};
    use anyhow::Result;
    use async_trait::async_trait;
    use persistence::Database;
    use std::time::Duration;

    struct StubEvaluator {
        ops: Vec<RawOpportunity>,
        delay: Duration,
    }

    impl StubEvaluator {
        fn instant(ops: Vec<RawOpportunity>) -> Self {
            Self {
                ops,
                delay: Duration::ZERO,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                ops: vec![raw_op("LATEUSDT", 70)],
                delay,
            }
        }
    }

    #[async_trait]
    impl StrategyEvaluator for StubEvaluator {
        async fn evaluate(&self, _ctx: &EvaluatorContext) -> Result<Vec<RawOpportunity>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.ops.clone())
        }
    }

    struct FailingEvaluator;

    #[async_trait]
    impl StrategyEvaluator for FailingEvaluator {
        async fn evaluate(&self, _ctx: &EvaluatorContext) -> Result<Vec<RawOpportunity>> {
            anyhow::bail!("exchange feed unavailable")
        }
    }

    fn raw_op(sym: &str, confidence: u32) -> RawOpportunity {
        let mut raw =
            RawOpportunity::new(sym, OpportunityCategory::Momentum, SuggestedAction::Buy);
        raw.confidence = json!(confidence);
        raw
    }

    fn test_universe() -> AssetUniverse {
        AssetUniverse {
            institutional: vec![
                symbol("BTCUSDT", dec!(42000), dec!(2), dec!(900000)),
                symbol("ETHUSDT", dec!(2200), dec!(1), dec!(500000)),
            ],
            retail: vec![symbol("DOGEUSDT", dec!(0.1), dec!(5), dec!(50000))],
        }
    }

    fn short_config() -> ScanConfig {
        ScanConfig {
            overall_budget: Duration::from_secs(5),
            strategy_budget: Duration::from_secs(5),
            max_concurrency: 4,
            fallback_count: 2,
            result_ttl: Duration::from_secs(300),
        }
    }

    async fn orchestrator_with(
        registry: StrategyRegistry,
        config: ScanConfig,
    ) -> (ScanOrchestrator, Arc<ScanStore>) {
        let db = Database::in_memory().await.unwrap();
        let store = Arc::new(ScanStore::new(&db, config.result_ttl));
        let orchestrator = ScanOrchestrator::new(
            store.clone(),
            Arc::new(registry),
            Arc::new(FreeAccessOnly),
            Arc::new(StaticUniverse::new(test_universe())),
            config,
        );
        (orchestrator, store)
    }

    async fn wait_terminal(store: &ScanStore, cache_key: &str) -> ScanRecord {
        for _ in 0..200 {
            if let Some(record) = store.get(cache_key).await {
                if record.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("scan did not reach a terminal state in time");
    }

    #[tokio::test]
    async fn placeholder_is_visible_before_any_strategy_completes() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            "slow",
            "Slow",
            StrategyTier::Free,
            Arc::new(StubEvaluator::slow(Duration::from_secs(30))),
        );
        let (orchestrator, store) = orchestrator_with(registry, short_config()).await;

        let request = ScanRequest::new("user-1");
        let cache_key = request.cache_key();
        let scan_id = orchestrator.start_scan(request).await.unwrap();

        let record = store.get(&cache_key).await.unwrap();
        assert_eq!(record.scan_id, scan_id);
        assert!(!record.is_terminal());
        assert_eq!(record.strategies_total, 1);
        assert!(record.opportunities.is_empty());
        assert_eq!(store.resolve_scan(&scan_id).await, Some(cache_key));
    }

    #[tokio::test]
    async fn scan_completes_with_strategy_results() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            "momentum",
            "Momentum",
            StrategyTier::Free,
            Arc::new(StubEvaluator::instant(vec![
                raw_op("BTCUSDT", 80),
                raw_op("ETHUSDT", 70),
            ])),
        );
        let (orchestrator, store) = orchestrator_with(registry, short_config()).await;

        let request = ScanRequest::new("user-1");
        let cache_key = request.cache_key();
        orchestrator.start_scan(request).await.unwrap();

        let record = wait_terminal(&store, &cache_key).await;
        assert_eq!(record.state, ScanState::Complete);
        assert_eq!(record.strategies_completed, 1);
        assert_eq!(record.opportunities.len(), 2);
        let perf = &record.strategy_performance["momentum"];
        assert_eq!(perf.outcome, StrategyOutcome::Succeeded);
        assert_eq!(perf.opportunities_found, 2);
    }

    #[tokio::test]
    async fn no_eligible_strategies_is_a_synchronous_precondition_error() {
        let (orchestrator, store) =
            orchestrator_with(StrategyRegistry::new(), short_config()).await;

        let request = ScanRequest::new("user-1");
        let cache_key = request.cache_key();
        let err = orchestrator.start_scan(request).await.unwrap_err();
        assert!(matches!(err, ScanError::NoEligibleStrategies));
        // Scan never created.
        assert!(store.get(&cache_key).await.is_none());
    }

    #[tokio::test]
    async fn straggler_times_out_without_losing_collected_results() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            "fast",
            "Fast",
            StrategyTier::Free,
            Arc::new(StubEvaluator::instant(vec![raw_op("BTCUSDT", 85)])),
        );
        registry.register(
            "straggler",
            "Straggler",
            StrategyTier::Free,
            Arc::new(StubEvaluator::slow(Duration::from_secs(60))),
        );
        let config = ScanConfig {
            overall_budget: Duration::from_millis(400),
            ..short_config()
        };
        let (orchestrator, store) = orchestrator_with(registry, config).await;

        let request = ScanRequest::new("user-1");
        let cache_key = request.cache_key();
        let started = std::time::Instant::now();
        orchestrator.start_scan(request).await.unwrap();

        let record = wait_terminal(&store, &cache_key).await;
        // Bounded overrun beyond the overall deadline.
        assert!(started.elapsed() < Duration::from_secs(5));

        assert_eq!(record.state, ScanState::Complete);
        assert_eq!(
            record.strategy_performance["straggler"].outcome,
            StrategyOutcome::TimedOut
        );
        assert_eq!(
            record.strategy_performance["fast"].outcome,
            StrategyOutcome::Succeeded
        );
        assert!(record
            .opportunities
            .iter()
            .any(|o| o.symbol == "BTCUSDT" && !o.fallback));
    }

    #[tokio::test]
    async fn strategy_failure_degrades_instead_of_failing_the_scan() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            "broken",
            "Broken",
            StrategyTier::Free,
            Arc::new(FailingEvaluator),
        );
        registry.register(
            "working",
            "Working",
            StrategyTier::Free,
            Arc::new(StubEvaluator::instant(vec![raw_op("ETHUSDT", 75)])),
        );
        let (orchestrator, store) = orchestrator_with(registry, short_config()).await;

        let request = ScanRequest::new("user-1");
        let cache_key = request.cache_key();
        orchestrator.start_scan(request).await.unwrap();

        let record = wait_terminal(&store, &cache_key).await;
        assert_eq!(record.state, ScanState::Complete);
        let broken = &record.strategy_performance["broken"];
        assert_eq!(broken.outcome, StrategyOutcome::Failed);
        assert!(broken.error.as_deref().unwrap().contains("unavailable"));
        assert_eq!(record.opportunities.len(), 1);
    }

    #[tokio::test]
    async fn all_strategies_failing_marks_the_scan_failed() {
        let mut registry = StrategyRegistry::new();
        registry.register("a", "A", StrategyTier::Free, Arc::new(FailingEvaluator));
        registry.register("b", "B", StrategyTier::Free, Arc::new(FailingEvaluator));
        let (orchestrator, store) = orchestrator_with(registry, short_config()).await;

        let request = ScanRequest::new("user-1");
        let cache_key = request.cache_key();
        orchestrator.start_scan(request).await.unwrap();

        let record = wait_terminal(&store, &cache_key).await;
        assert_eq!(record.state, ScanState::Failed);
        assert!(record.opportunities.is_empty());
    }

    #[tokio::test]
    async fn zero_signals_yields_tagged_market_watch_fallback() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            "quiet",
            "Quiet",
            StrategyTier::Free,
            Arc::new(StubEvaluator::instant(Vec::new())),
        );
        let (orchestrator, store) = orchestrator_with(registry, short_config()).await;

        let request = ScanRequest::new("user-1");
        let cache_key = request.cache_key();
        orchestrator.start_scan(request).await.unwrap();

        let record = wait_terminal(&store, &cache_key).await;
        assert_eq!(record.state, ScanState::Complete);
        assert_eq!(record.opportunities.len(), 2);
        for opp in &record.opportunities {
            assert!(opp.fallback);
            assert_eq!(opp.category, OpportunityCategory::MarketWatch);
            assert_eq!(opp.strategy_id, "market_watch");
        }
        // Highest-activity symbol leads.
        assert_eq!(record.opportunities[0].symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn progress_counter_is_monotonic_across_polls() {
        let mut registry = StrategyRegistry::new();
        for (id, delay_ms) in [("a", 0u64), ("b", 80), ("c", 160)] {
            registry.register(
                id,
                id,
                StrategyTier::Free,
                Arc::new(StubEvaluator {
                    ops: vec![raw_op("BTCUSDT", 70)],
                    delay: Duration::from_millis(delay_ms),
                }),
            );
        }
        let (orchestrator, store) = orchestrator_with(registry, short_config()).await;

        let request = ScanRequest::new("user-1");
        let cache_key = request.cache_key();
        orchestrator.start_scan(request).await.unwrap();

        let mut observed = Vec::new();
        for _ in 0..200 {
            if let Some(record) = store.get(&cache_key).await {
                observed.push(record.strategies_completed);
                if record.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(observed.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*observed.last().unwrap(), 3);
    }

    #[tokio::test]
    async fn min_confidence_filters_low_scoring_signals() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            "mixed",
            "Mixed",
            StrategyTier::Free,
            Arc::new(StubEvaluator::instant(vec![
                raw_op("BTCUSDT", 80),
                raw_op("ETHUSDT", 30),
            ])),
        );
        let (orchestrator, store) = orchestrator_with(registry, short_config()).await;

        let mut request = ScanRequest::new("user-1");
        request.min_confidence = Some(dec!(60));
        let cache_key = request.cache_key();
        orchestrator.start_scan(request).await.unwrap();

        let record = wait_terminal(&store, &cache_key).await;
        assert_eq!(record.opportunities.len(), 1);
        assert_eq!(record.opportunities[0].symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn in_flight_scan_is_reused_unless_refresh_is_forced() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            "slow",
            "Slow",
            StrategyTier::Free,
            Arc::new(StubEvaluator::slow(Duration::from_secs(30))),
        );
        let (orchestrator, store) = orchestrator_with(registry, short_config()).await;

        let request = ScanRequest::new("user-1");
        let cache_key = request.cache_key();
        let first = orchestrator.start_scan(request.clone()).await.unwrap();
        let second = orchestrator.start_scan(request.clone()).await.unwrap();
        assert_eq!(first, second);

        let mut forced = request;
        forced.force_refresh = true;
        let third = orchestrator.start_scan(forced).await.unwrap();
        assert_ne!(first, third);

        // Same slot, new scan id.
        let record = store.get(&cache_key).await.unwrap();
        assert_eq!(record.scan_id, third);
        // The old scan id still resolves to the (overwritten) slot.
        assert_eq!(store.resolve_scan(&first).await, Some(cache_key));
    }
}
