//! Mean reversion — fade moves stretched to the edge of the 24h range

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use persistence::{OpportunityCategory, SuggestedAction};

use crate::ingest::RawOpportunity;

use super::{EvaluatorContext, StrategyEvaluator};

pub struct MeanReversionEvaluator {
    /// Position within the 24h range below which a symbol counts as washed
    /// out (and, mirrored, above which it counts as extended).
    edge: Decimal,
}

impl Default for MeanReversionEvaluator {
    fn default() -> Self {
        Self { edge: dec!(0.15) }
    }
}

#[async_trait]
impl StrategyEvaluator for MeanReversionEvaluator {
    async fn evaluate(&self, ctx: &EvaluatorContext) -> Result<Vec<RawOpportunity>> {
        let hundred = dec!(100);
        let mut candidates = Vec::new();

        for activity in ctx.universe.all() {
            let range = activity.high_price - activity.low_price;
            if range <= Decimal::ZERO || activity.last_price <= Decimal::ZERO {
                continue;
            }
            // 0 = at the 24h low, 1 = at the 24h high.
            let position = (activity.last_price - activity.low_price) / range;
            let mid = (activity.high_price + activity.low_price) / dec!(2);

            let (action, distance) = if position <= self.edge {
                (SuggestedAction::Buy, self.edge - position)
            } else if position >= Decimal::ONE - self.edge {
                (SuggestedAction::Sell, position - (Decimal::ONE - self.edge))
            } else {
                continue;
            };

            let confidence = (dec!(55) + distance * dec!(200)).min(dec!(90));

            let mut raw = RawOpportunity::new(
                activity.symbol.clone(),
                OpportunityCategory::MeanReversion,
                action,
            );
            raw.confidence = json!(confidence);
            raw.entry_price = json!(activity.last_price);
            raw.target_price = json!(mid);
            raw.profit_potential_pct =
                json!(((mid - activity.last_price) / activity.last_price * hundred).abs());
            raw.stop_loss = match action {
                SuggestedAction::Buy => json!(activity.low_price * dec!(0.99)),
                // Shorting against a range top has no natural stop from the
                // 24h snapshot; leave it explicitly unknown.
                _ => Value::Null,
            };
            raw.metadata = json!({
                "range_position": position,
                "range_low": activity.low_price,
                "range_high": activity.high_price,
            });
            candidates.push(raw);
        }

        Ok(candidates)
    }
}
