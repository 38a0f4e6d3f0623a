//! fks-providers
//!
//! Concrete provider adapters: each implements `fks_core::ProviderAdapter`
//! and is composed with the shared lifecycle via `fks_core::Adapter<A>`.
//! The twelve adapters here cover every row-schema family of
//! `fks-types::row`: bar/kline (`binance`, `coingecko`, `polygon`,
//! `alpha_vantage`, `finnhub`, `tiingo`, `kraken`, `coinbase`, `bybit`),
//! quote/ticker (`cmc`), fundamentals/time-series (`eodhd`), and futures
//! microstructure (`massive_futures`).
#![warn(missing_docs)]

mod alpha_vantage;
mod binance;
mod bybit;
mod cmc;
mod coinbase;
mod coingecko;
mod eodhd;
mod finnhub;
mod kraken;
mod massive_futures;
mod polygon;
mod tiingo;

pub use alpha_vantage::AlphaVantageAdapter;
pub use binance::BinanceAdapter;
pub use bybit::BybitAdapter;
pub use cmc::CmcAdapter;
pub use coinbase::CoinbaseAdapter;
pub use coingecko::CoinGeckoAdapter;
pub use eodhd::EodhdAdapter;
pub use finnhub::FinnhubAdapter;
pub use kraken::KrakenAdapter;
pub use massive_futures::MassiveFuturesAdapter;
pub use polygon::PolygonAdapter;
pub use tiingo::TiingoAdapter;
