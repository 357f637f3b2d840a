//! Ingestion of raw strategy output into strict internal types.
//!
//! Strategy evaluators hand back loosely-typed payloads: numeric fields may
//! arrive as JSON numbers, as strings, as explicit `null`, or not at all.
//! Everything is converted here, at the boundary, before the rest of the
//! system touches it. A present-but-null field resolves to the same
//! fallback as an absent one — it must never surface as a conversion error,
//! and "unknown" must never turn into a fake zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use persistence::{Opportunity, OpportunityCategory, SuggestedAction};

/// Candidate opportunity as emitted by a strategy evaluator, before
/// normalization. Optional numeric fields stay as raw JSON values until
/// [`normalize`] resolves them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOpportunity {
    pub symbol: String,
    pub category: OpportunityCategory,
    pub action: SuggestedAction,
    #[serde(default)]
    pub confidence: Value,
    #[serde(default)]
    pub profit_potential_pct: Value,
    #[serde(default)]
    pub entry_price: Value,
    #[serde(default)]
    pub target_price: Value,
    #[serde(default)]
    pub stop_loss: Value,
    #[serde(default)]
    pub metadata: Value,
}

impl RawOpportunity {
    pub fn new(
        symbol: impl Into<String>,
        category: OpportunityCategory,
        action: SuggestedAction,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            category,
            action,
            confidence: Value::Null,
            profit_potential_pct: Value::Null,
            entry_price: Value::Null,
            target_price: Value::Null,
            stop_loss: Value::Null,
            metadata: Value::Null,
        }
    }
}

/// Confidence applied when a strategy omits (or nulls) its score: the
/// opportunity survives ingestion but ranks below any scored signal.
pub const UNSCORED_CONFIDENCE: Decimal = Decimal::ZERO;

const MAX_CONFIDENCE: u32 = 100;

/// Parse an optional numeric field. `null` and absent both mean "unknown"
/// (`None`); malformed values are treated the same way rather than
/// poisoning the whole scan.
pub fn opt_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        Value::String(s) => Decimal::from_str_exact(s).ok().or_else(|| s.parse().ok()),
        _ => None,
    }
}

/// Parse a numeric field with a documented fallback for null/absent input.
pub fn decimal_or(value: &Value, fallback: Decimal) -> Decimal {
    opt_decimal(value).unwrap_or(fallback)
}

/// Convert a raw evaluator payload into the strict internal record.
pub fn normalize(strategy_id: &str, raw: RawOpportunity) -> Opportunity {
    let confidence = decimal_or(&raw.confidence, UNSCORED_CONFIDENCE)
        .clamp(Decimal::ZERO, Decimal::from(MAX_CONFIDENCE));

    Opportunity {
        symbol: raw.symbol,
        strategy_id: strategy_id.to_string(),
        category: raw.category,
        confidence,
        action: raw.action,
        profit_potential_pct: opt_decimal(&raw.profit_potential_pct),
        entry_price: opt_decimal(&raw.entry_price),
        target_price: opt_decimal(&raw.target_price),
        stop_loss: opt_decimal(&raw.stop_loss),
        fallback: false,
        metadata: raw.metadata,
    }
}
