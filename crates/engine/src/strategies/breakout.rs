//! Range breakout — symbols pressing through their 24h extremes

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use persistence::{OpportunityCategory, SuggestedAction};

use crate::ingest::RawOpportunity;

use super::{EvaluatorContext, StrategyEvaluator};

pub struct BreakoutEvaluator {
    /// How close to the 24h extreme (as a fraction of it) still counts.
    proximity: Decimal,
}

impl Default for BreakoutEvaluator {
    fn default() -> Self {
        Self {
            proximity: dec!(0.005),
        }
    }
}

#[async_trait]
impl StrategyEvaluator for BreakoutEvaluator {
    async fn evaluate(&self, ctx: &EvaluatorContext) -> Result<Vec<RawOpportunity>> {
        let mut candidates = Vec::new();

        for activity in ctx.universe.all() {
            if activity.high_price <= Decimal::ZERO {
                continue;
            }

            let near_high =
                activity.last_price >= activity.high_price * (Decimal::ONE - self.proximity);
            let near_low =
                activity.last_price <= activity.low_price * (Decimal::ONE + self.proximity);

            let action = if near_high && activity.price_change_pct > Decimal::ZERO {
                SuggestedAction::Buy
            } else if near_low && activity.price_change_pct < Decimal::ZERO {
                SuggestedAction::Sell
            } else {
                continue;
            };

            let confidence =
                (dec!(60) + activity.price_change_pct.abs() * dec!(2)).min(dec!(92));

            let mut raw = RawOpportunity::new(
                activity.symbol.clone(),
                OpportunityCategory::Breakout,
                action,
            );
            raw.confidence = json!(confidence);
            raw.entry_price = json!(activity.last_price);
            // A fresh breakout has no measured ceiling; the target is
            // genuinely unknown rather than zero.
            raw.target_price = Value::Null;
            raw.stop_loss = match action {
                SuggestedAction::Buy => json!(activity.high_price * dec!(0.97)),
                _ => json!(activity.low_price * dec!(1.03)),
            };
            raw.metadata = json!({
                "range_high": activity.high_price,
                "range_low": activity.low_price,
                "direction": if action == SuggestedAction::Buy { "upside" } else { "downside" },
            });
            candidates.push(raw);
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskTolerance;
    use crate::universe::{AssetUniverse, SymbolActivity};
    use std::time::Duration;

    #[tokio::test]
    async fn breakout_target_is_explicitly_unknown() {
        let universe = AssetUniverse {
            institutional: vec![SymbolActivity {
                symbol: "BTCUSDT".into(),
                last_price: dec!(44950),
                price_change_pct: dec!(5),
                high_price: dec!(45000),
                low_price: dec!(41000),
                quote_volume: dec!(900000),
            }],
            retail: vec![],
        };
        let ctx = EvaluatorContext {
            user_id: "u1".into(),
            risk_tolerance: RiskTolerance::Balanced,
            universe,
            budget: Duration::from_secs(5),
        };

        let ops = BreakoutEvaluator::default().evaluate(&ctx).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].target_price.is_null());
        assert!(!ops[0].stop_loss.is_null());
    }
}
