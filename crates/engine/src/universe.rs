//! Tiered asset universe resolution
//!
//! The universe is the set of symbols a user's strategies are allowed to
//! scan, partitioned into an institutional tier (deepest books) and a
//! retail tier, ranked by 24h quote volume. Resolving it is part of the
//! synchronous scan-start path: a failure here is a structural precondition
//! failure, not a per-strategy error.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::api::{BinanceClient, Ticker24h};

/// One symbol with the 24h activity snapshot strategies evaluate against.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolActivity {
    pub symbol: String,
    pub last_price: Decimal,
    pub price_change_pct: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub quote_volume: Decimal,
}

impl From<Ticker24h> for SymbolActivity {
    fn from(t: Ticker24h) -> Self {
        Self {
            symbol: t.symbol,
            last_price: t.last_price,
            price_change_pct: t.price_change_percent,
            high_price: t.high_price,
            low_price: t.low_price,
            quote_volume: t.quote_volume,
        }
    }
}

/// The tradable symbol set for one user, volume-ranked within each tier.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetUniverse {
    pub institutional: Vec<SymbolActivity>,
    pub retail: Vec<SymbolActivity>,
}

impl AssetUniverse {
    pub fn all(&self) -> impl Iterator<Item = &SymbolActivity> {
        self.institutional.iter().chain(self.retail.iter())
    }

    pub fn len(&self) -> usize {
        self.institutional.len() + self.retail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.institutional.is_empty() && self.retail.is_empty()
    }

    /// Highest-activity symbols across both tiers (tiers are already
    /// volume-ranked, institutional first).
    pub fn most_active(&self, n: usize) -> Vec<&SymbolActivity> {
        self.all().take(n).collect()
    }
}

#[async_trait]
pub trait AssetUniverseProvider: Send + Sync {
    /// Resolve the tiered universe for a user.
    async fn universe(&self, user_id: &str) -> Result<AssetUniverse>;
}

/// Universe provider backed by exchange-wide 24h statistics: symbols quoted
/// in the configured asset, ranked by quote volume, split into tiers.
pub struct VolumeRankedUniverse {
    client: Arc<BinanceClient>,
    quote_asset: String,
    institutional_count: usize,
    retail_count: usize,
}

impl VolumeRankedUniverse {
    pub fn new(client: Arc<BinanceClient>) -> Self {
        Self {
            client,
            quote_asset: "USDT".to_string(),
            institutional_count: 10,
            retail_count: 20,
        }
    }

    pub fn with_tier_sizes(mut self, institutional: usize, retail: usize) -> Self {
        self.institutional_count = institutional;
        self.retail_count = retail;
        self
    }

    fn partition(&self, mut symbols: Vec<SymbolActivity>) -> AssetUniverse {
        symbols.sort_by(|a, b| b.quote_volume.cmp(&a.quote_volume));
        let mut iter = symbols.into_iter();
        let institutional: Vec<_> = iter.by_ref().take(self.institutional_count).collect();
        let retail: Vec<_> = iter.take(self.retail_count).collect();
        AssetUniverse {
            institutional,
            retail,
        }
    }
}

#[async_trait]
impl AssetUniverseProvider for VolumeRankedUniverse {
    async fn universe(&self, user_id: &str) -> Result<AssetUniverse> {
        let tickers = self.client.get_24h_stats_all().await?;

        let symbols: Vec<SymbolActivity> = tickers
            .into_iter()
            .filter(|t| t.symbol.ends_with(&self.quote_asset))
            .filter(|t| t.last_price > Decimal::ZERO)
            .map(SymbolActivity::from)
            .collect();

        let universe = self.partition(symbols);
        debug!(
            user = %user_id,
            institutional = universe.institutional.len(),
            retail = universe.retail.len(),
            "Resolved asset universe"
        );

        if universe.is_empty() {
            anyhow::bail!("no tradable symbols quoted in {}", self.quote_asset);
        }
        Ok(universe)
    }
}

/// Fixed universe, used by tests and offline runs.
pub struct StaticUniverse {
    universe: AssetUniverse,
}

impl StaticUniverse {
    pub fn new(universe: AssetUniverse) -> Self {
        Self { universe }
    }
}

#[async_trait]
impl AssetUniverseProvider for StaticUniverse {
    async fn universe(&self, _user_id: &str) -> Result<AssetUniverse> {
        if self.universe.is_empty() {
            anyhow::bail!("static universe is empty");
        }
        Ok(self.universe.clone())
    }
}

#[cfg(test)]
pub(crate) fn symbol(sym: &str, last: Decimal, change_pct: Decimal, volume: Decimal) -> SymbolActivity {
    SymbolActivity {
        symbol: sym.to_string(),
        last_price: last,
        price_change_pct: change_pct,
        high_price: last * Decimal::new(105, 2),
        low_price: last * Decimal::new(95, 2),
        quote_volume: volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ranked(symbols: Vec<SymbolActivity>, inst: usize, retail: usize) -> AssetUniverse {
        let client = Arc::new(BinanceClient::new());
        VolumeRankedUniverse::new(client)
            .with_tier_sizes(inst, retail)
            .partition(symbols)
    }

    #[test]
    fn partition_ranks_by_volume_and_splits_tiers() {
        let universe = ranked(
            vec![
                symbol("LOWUSDT", dec!(1), dec!(0), dec!(100)),
                symbol("BTCUSDT", dec!(42000), dec!(1), dec!(900000)),
                symbol("ETHUSDT", dec!(2200), dec!(2), dec!(500000)),
            ],
            2,
            5,
        );

        assert_eq!(universe.institutional.len(), 2);
        assert_eq!(universe.institutional[0].symbol, "BTCUSDT");
        assert_eq!(universe.institutional[1].symbol, "ETHUSDT");
        assert_eq!(universe.retail.len(), 1);
        assert_eq!(universe.retail[0].symbol, "LOWUSDT");
    }

    #[test]
    fn most_active_walks_institutional_first() {
        let universe = ranked(
            vec![
                symbol("AUSDT", dec!(1), dec!(0), dec!(300)),
                symbol("BUSDT", dec!(1), dec!(0), dec!(200)),
                symbol("CUSDT", dec!(1), dec!(0), dec!(100)),
            ],
            1,
            5,
        );

        let top: Vec<_> = universe.most_active(2).iter().map(|s| s.symbol.clone()).collect();
        assert_eq!(top, vec!["AUSDT", "BUSDT"]);
    }

    #[tokio::test]
    async fn static_universe_rejects_empty() {
        let provider = StaticUniverse::new(AssetUniverse::default());
        assert!(provider.universe("u1").await.is_err());
    }
}
