//! Port traits: the narrow interfaces the core uses to reach collaborators.

pub mod alert_port;
pub mod config_port;
pub mod data_port;
pub mod quote_port;
pub mod report_port;
pub mod trade_store;
