//! Core domain types and logic.

pub mod audit;
pub mod backtest;
pub mod config_validation;
pub mod ema;
pub mod error;
pub mod lifecycle;
pub mod live;
pub mod metrics;
pub mod observation;
pub mod ohlcv;
pub mod patterns;
pub mod signal;
pub mod ticker_data;
pub mod trade;
