//! Momentum strategy — trade continuation of strong 24h moves

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use persistence::{OpportunityCategory, SuggestedAction};

use crate::ingest::RawOpportunity;
use crate::types::RiskTolerance;

use super::{EvaluatorContext, StrategyEvaluator};

pub struct MomentumEvaluator {
    /// Minimum absolute 24h move (percent) to count as momentum.
    min_move_pct: Decimal,
}

impl Default for MomentumEvaluator {
    fn default() -> Self {
        Self {
            min_move_pct: dec!(3),
        }
    }
}

impl MomentumEvaluator {
    fn threshold(&self, risk: RiskTolerance) -> Decimal {
        match risk {
            RiskTolerance::Conservative => self.min_move_pct * dec!(2),
            RiskTolerance::Balanced => self.min_move_pct,
            RiskTolerance::Aggressive => self.min_move_pct / dec!(2),
        }
    }
}

#[async_trait]
impl StrategyEvaluator for MomentumEvaluator {
    async fn evaluate(&self, ctx: &EvaluatorContext) -> Result<Vec<RawOpportunity>> {
        let threshold = self.threshold(ctx.risk_tolerance);
        let hundred = dec!(100);
        let mut candidates = Vec::new();

        for activity in ctx.universe.all() {
            let change = activity.price_change_pct;
            if change.abs() < threshold {
                continue;
            }

            let action = if change > Decimal::ZERO {
                SuggestedAction::Buy
            } else {
                SuggestedAction::Sell
            };
            let confidence = (dec!(50) + change.abs() * dec!(4)).min(dec!(95));
            let entry = activity.last_price;
            // Expect roughly half the move to carry forward.
            let target = entry * (hundred + change / dec!(2)) / hundred;
            let stop = match action {
                SuggestedAction::Buy => entry * dec!(0.97),
                _ => entry * dec!(1.03),
            };

            let mut raw = RawOpportunity::new(
                activity.symbol.clone(),
                OpportunityCategory::Momentum,
                action,
            );
            raw.confidence = json!(confidence);
            raw.entry_price = json!(entry);
            raw.target_price = json!(target);
            raw.stop_loss = json!(stop);
            raw.profit_potential_pct = json!(change.abs() / dec!(2));
            raw.metadata = json!({
                "price_change_pct_24h": change,
                "quote_volume_24h": activity.quote_volume,
            });
            candidates.push(raw);
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::{symbol, AssetUniverse};
    use std::time::Duration;

    fn ctx(universe: AssetUniverse, risk: RiskTolerance) -> EvaluatorContext {
        EvaluatorContext {
            user_id: "u1".into(),
            risk_tolerance: risk,
            universe,
            budget: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn strong_mover_yields_buy_signal() {
        let universe = AssetUniverse {
            institutional: vec![
                symbol("BTCUSDT", dec!(42000), dec!(6), dec!(900000)),
                symbol("ETHUSDT", dec!(2200), dec!(0.5), dec!(500000)),
            ],
            retail: vec![],
        };

        let ops = MomentumEvaluator::default()
            .evaluate(&ctx(universe, RiskTolerance::Balanced))
            .await
            .unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].symbol, "BTCUSDT");
        assert_eq!(ops[0].action, SuggestedAction::Buy);
    }

    #[tokio::test]
    async fn conservative_tolerance_raises_the_bar() {
        let universe = AssetUniverse {
            institutional: vec![symbol("BTCUSDT", dec!(42000), dec!(4), dec!(900000))],
            retail: vec![],
        };

        let evaluator = MomentumEvaluator::default();
        let balanced = evaluator
            .evaluate(&ctx(universe.clone(), RiskTolerance::Balanced))
            .await
            .unwrap();
        let conservative = evaluator
            .evaluate(&ctx(universe, RiskTolerance::Conservative))
            .await
            .unwrap();

        assert_eq!(balanced.len(), 1);
        assert!(conservative.is_empty());
    }
}
