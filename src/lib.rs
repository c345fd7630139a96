//! smctrader: Smart Money Concepts pattern detection, setup generation and
//! trade lifecycle management, driven by historical replay or live polling.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], command dispatch in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
