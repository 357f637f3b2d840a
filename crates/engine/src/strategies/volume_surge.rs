//! Volume surge — turnover far above the universe norm

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use persistence::{OpportunityCategory, SuggestedAction};

use crate::ingest::RawOpportunity;

use super::{EvaluatorContext, StrategyEvaluator};

pub struct VolumeSurgeEvaluator {
    /// Multiple of the universe's mean quote volume that counts as a surge.
    surge_factor: Decimal,
    /// Minimum absolute 24h move for the surge to be directional.
    min_move_pct: Decimal,
}

impl Default for VolumeSurgeEvaluator {
    fn default() -> Self {
        Self {
            surge_factor: dec!(3),
            min_move_pct: dec!(2),
        }
    }
}

#[async_trait]
impl StrategyEvaluator for VolumeSurgeEvaluator {
    async fn evaluate(&self, ctx: &EvaluatorContext) -> Result<Vec<RawOpportunity>> {
        let count = ctx.universe.len();
        if count == 0 {
            return Ok(Vec::new());
        }
        let total: Decimal = ctx.universe.all().map(|s| s.quote_volume).sum();
        let mean = total / Decimal::from(count as u64);
        if mean <= Decimal::ZERO {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for activity in ctx.universe.all() {
            if activity.quote_volume < mean * self.surge_factor {
                continue;
            }
            if activity.price_change_pct.abs() < self.min_move_pct {
                continue;
            }

            let action = if activity.price_change_pct > Decimal::ZERO {
                SuggestedAction::Buy
            } else {
                SuggestedAction::Watch
            };
            let ratio = activity.quote_volume / mean;
            let confidence = (dec!(40) + ratio * dec!(5)).min(dec!(85));

            let mut raw = RawOpportunity::new(
                activity.symbol.clone(),
                OpportunityCategory::VolumeSurge,
                action,
            );
            raw.confidence = json!(confidence);
            raw.entry_price = json!(activity.last_price);
            raw.metadata = json!({
                "volume_vs_universe_mean": ratio,
                "quote_volume_24h": activity.quote_volume,
                "price_change_pct_24h": activity.price_change_pct,
            });
            candidates.push(raw);
        }

        Ok(candidates)
    }
}
