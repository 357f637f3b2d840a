//! External API clients

pub mod binance;

pub use binance::{BinanceClient, Ticker24h};
