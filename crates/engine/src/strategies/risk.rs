//! Risk management — flag holdings-grade symbols in sharp drawdown

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use persistence::{OpportunityCategory, SuggestedAction};

use crate::ingest::RawOpportunity;
use crate::types::RiskTolerance;

use super::{EvaluatorContext, StrategyEvaluator};

#[derive(Default)]
pub struct RiskManagementEvaluator;

impl RiskManagementEvaluator {
    fn drawdown_threshold(risk: RiskTolerance) -> Decimal {
        match risk {
            RiskTolerance::Conservative => dec!(-5),
            RiskTolerance::Balanced => dec!(-8),
            RiskTolerance::Aggressive => dec!(-12),
        }
    }
}

#[async_trait]
impl StrategyEvaluator for RiskManagementEvaluator {
    async fn evaluate(&self, ctx: &EvaluatorContext) -> Result<Vec<RawOpportunity>> {
        let threshold = Self::drawdown_threshold(ctx.risk_tolerance);
        let mut candidates = Vec::new();

        for activity in ctx.universe.all() {
            if activity.price_change_pct > threshold {
                continue;
            }

            let severity = (activity.price_change_pct - threshold).abs();
            let confidence = (dec!(65) + severity * dec!(2)).min(dec!(95));

            let mut raw = RawOpportunity::new(
                activity.symbol.clone(),
                OpportunityCategory::RiskManagement,
                SuggestedAction::Sell,
            );
            raw.confidence = json!(confidence);
            raw.entry_price = json!(activity.last_price);
            raw.stop_loss = json!(activity.last_price * dec!(0.98));
            // Exits protect capital; there is no profit target to state.
            raw.profit_potential_pct = Value::Null;
            raw.metadata = json!({
                "drawdown_pct_24h": activity.price_change_pct,
                "threshold_pct": threshold,
                "reason": "sharp drawdown exceeds risk tolerance",
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

    #[tokio::test]
    async fn flags_only_symbols_beyond_the_drawdown_threshold() {
        let universe = AssetUniverse {
            institutional: vec![
                symbol("DOWNUSDT", dec!(10), dec!(-9), dec!(100000)),
                symbol("FLATUSDT", dec!(10), dec!(-1), dec!(100000)),
            ],
            retail: vec![],
        };
        let ctx = EvaluatorContext {
            user_id: "u1".into(),
            risk_tolerance: RiskTolerance::Balanced,
            universe,
            budget: Duration::from_secs(5),
        };

        let ops = RiskManagementEvaluator.evaluate(&ctx).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].symbol, "DOWNUSDT");
        assert_eq!(ops[0].action, SuggestedAction::Sell);
        assert!(ops[0].profit_potential_pct.is_null());
    }
}
