//! Opportunity Discovery Engine — strategy fan-out and scan lifecycle
//!
//! Owns one end-to-end concern: accept a scan request, fan out to the
//! user's eligible strategy evaluators under a shared time budget, and
//! publish progressively-updated results through the shared store for
//! asynchronous polling. Provides:
//! - `ScanOrchestrator` — non-blocking scan start plus background fan-out
//! - `ScanStatusGateway` — the polling read path
//! - `StrategyRegistry` — pluggable evaluator lookup with eligibility tiers
//! - Binance public API client and volume-ranked asset universe

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod orchestrator;
pub mod strategies;
pub mod types;
pub mod universe;

// Re-exports for convenience
pub use api::{BinanceClient, Ticker24h};
pub use config::ScanConfig;
pub use error::ScanError;
pub use gateway::{ScanStatusGateway, StatusResponse};
pub use ingest::RawOpportunity;
pub use orchestrator::ScanOrchestrator;
pub use strategies::{
    CatalogEntry, EntitlementProvider, EvaluatorContext, FreeAccessOnly, StrategyEvaluator,
    StrategyRegistry, StrategyTier,
};
pub use types::{RiskTolerance, ScanRequest};
pub use universe::{
    AssetUniverse, AssetUniverseProvider, StaticUniverse, SymbolActivity, VolumeRankedUniverse,
};
