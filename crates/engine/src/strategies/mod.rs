//! Strategy evaluator interface and registry
//!
//! Each strategy is a [`StrategyEvaluator`] registered under a stable id.
//! The orchestrator never knows concrete strategy types — adding a strategy
//! means registering it here, nothing else. Eligibility is tier-based:
//! free strategies are available to everyone, premium ones only to users
//! the [`EntitlementProvider`] vouches for.

pub mod breakout;
pub mod mean_reversion;
pub mod momentum;
pub mod risk;
pub mod volume_surge;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::ingest::RawOpportunity;
use crate::types::RiskTolerance;
use crate::universe::AssetUniverse;

pub use breakout::BreakoutEvaluator;
pub use mean_reversion::MeanReversionEvaluator;
pub use momentum::MomentumEvaluator;
pub use risk::RiskManagementEvaluator;
pub use volume_surge::VolumeSurgeEvaluator;

/// Everything an evaluator gets for one scan.
#[derive(Debug, Clone)]
pub struct EvaluatorContext {
    pub user_id: String,
    pub risk_tolerance: RiskTolerance,
    pub universe: AssetUniverse,
    /// Time the evaluator may spend before it must return. The
    /// orchestrator also enforces this from the outside.
    pub budget: Duration,
}

/// A pluggable opportunity generator.
#[async_trait]
pub trait StrategyEvaluator: Send + Sync {
    /// Evaluate the universe and return raw candidates. Per-strategy
    /// failures are reported via `Err` and recorded against this strategy
    /// only — they never fail the scan.
    async fn evaluate(&self, ctx: &EvaluatorContext) -> Result<Vec<RawOpportunity>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyTier {
    Free,
    Premium,
}

/// Decides which premium strategies a user owns. Backed by the billing
/// service in production; the default grants nothing.
pub trait EntitlementProvider: Send + Sync {
    fn owns(&self, user_id: &str, strategy_id: &str) -> bool;
}

/// Free strategies only.
pub struct FreeAccessOnly;

impl EntitlementProvider for FreeAccessOnly {
    fn owns(&self, _user_id: &str, _strategy_id: &str) -> bool {
        false
    }
}

struct StrategyEntry {
    id: String,
    name: String,
    tier: StrategyTier,
    evaluator: Arc<dyn StrategyEvaluator>,
}

/// Catalog row returned by the strategy listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub tier: StrategyTier,
    pub eligible: bool,
}

/// Lookup table of available strategies, keyed by id.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<StrategyEntry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in evaluator set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            "momentum",
            "Momentum",
            StrategyTier::Free,
            Arc::new(MomentumEvaluator::default()),
        );
        registry.register(
            "mean_reversion",
            "Mean Reversion",
            StrategyTier::Free,
            Arc::new(MeanReversionEvaluator::default()),
        );
        registry.register(
            "breakout",
            "Range Breakout",
            StrategyTier::Free,
            Arc::new(BreakoutEvaluator::default()),
        );
        registry.register(
            "volume_surge",
            "Volume Surge",
            StrategyTier::Free,
            Arc::new(VolumeSurgeEvaluator::default()),
        );
        registry.register(
            "risk_management",
            "Risk Management",
            StrategyTier::Premium,
            Arc::new(RiskManagementEvaluator::default()),
        );
        registry
    }

    pub fn register(
        &mut self,
        id: &str,
        name: &str,
        tier: StrategyTier,
        evaluator: Arc<dyn StrategyEvaluator>,
    ) {
        self.entries.push(StrategyEntry {
            id: id.to_string(),
            name: name.to_string(),
            tier,
            evaluator,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strategies this user may run: every free strategy plus owned
    /// premium ones.
    pub fn eligible_for(
        &self,
        user_id: &str,
        entitlements: &dyn EntitlementProvider,
    ) -> Vec<(String, Arc<dyn StrategyEvaluator>)> {
        self.entries
            .iter()
            .filter(|e| e.tier == StrategyTier::Free || entitlements.owns(user_id, &e.id))
            .map(|e| (e.id.clone(), e.evaluator.clone()))
            .collect()
    }

    /// Full catalog with per-user eligibility flags.
    pub fn catalog_for(
        &self,
        user_id: &str,
        entitlements: &dyn EntitlementProvider,
    ) -> Vec<CatalogEntry> {
        self.entries
            .iter()
            .map(|e| CatalogEntry {
                id: e.id.clone(),
                name: e.name.clone(),
                tier: e.tier,
                eligible: e.tier == StrategyTier::Free || entitlements.owns(user_id, &e.id),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OwnsEverything;
    impl EntitlementProvider for OwnsEverything {
        fn owns(&self, _user_id: &str, _strategy_id: &str) -> bool {
            true
        }
    }

    #[test]
    fn free_access_excludes_premium_strategies() {
        let registry = StrategyRegistry::builtin();
        let eligible = registry.eligible_for("u1", &FreeAccessOnly);
        assert_eq!(eligible.len(), 4);
        assert!(!eligible.iter().any(|(id, _)| id == "risk_management"));
    }

    #[test]
    fn entitled_user_gets_premium_strategies() {
        let registry = StrategyRegistry::builtin();
        let eligible = registry.eligible_for("u1", &OwnsEverything);
        assert_eq!(eligible.len(), registry.len());
    }

    #[test]
    fn catalog_flags_eligibility_per_user() {
        let registry = StrategyRegistry::builtin();
        let catalog = registry.catalog_for("u1", &FreeAccessOnly);
        let premium = catalog.iter().find(|c| c.id == "risk_management").unwrap();
        assert!(!premium.eligible);
        assert!(catalog.iter().filter(|c| c.eligible).count() >= 4);
    }
}
