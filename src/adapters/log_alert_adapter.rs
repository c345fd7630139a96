//! Alert transport that writes messages to the tracing log.

use tracing::info;

use crate::domain::error::SmcError;
use crate::ports::alert_port::AlertPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertAdapter;

impl AlertPort for LogAlertAdapter {
    fn send(&self, message: &str) -> Result<(), SmcError> {
        info!(target: "smctrader::alert", "{message}");
        Ok(())
    }
}
