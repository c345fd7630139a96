//! In-process trade store.
//!
//! A single mutex guards the whole table, so the uniqueness check and the
//! insert in `create_if_absent` cannot interleave with another writer.

use std::sync::{Mutex, MutexGuard};

use crate::domain::error::SmcError;
use crate::domain::lifecycle::admits;
use crate::domain::trade::Trade;
use crate::ports::trade_store::TradeStore;

#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    trades: Mutex<Vec<Trade>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Trade>>, SmcError> {
        self.trades.lock().map_err(|_| SmcError::Database {
            reason: "trade store lock poisoned".into(),
        })
    }
}

impl TradeStore for MemoryTradeStore {
    fn create_if_absent(
        &self,
        trade: &Trade,
        single_active_per_ticker: bool,
    ) -> Result<Option<Trade>, SmcError> {
        let mut trades = self.lock()?;
        if !admits(&trades, trade, single_active_per_ticker) {
            return Ok(None);
        }
        let mut stored = trade.clone();
        stored.id = Some(trades.len() as i64 + 1);
        trades.push(stored.clone());
        Ok(Some(stored))
    }

    fn update(&self, trade: &Trade) -> Result<(), SmcError> {
        let mut trades = self.lock()?;
        let slot = trades
            .iter_mut()
            .find(|t| t.id.is_some() && t.id == trade.id)
            .filter(|t| t.is_active())
            .ok_or_else(|| SmcError::DatabaseQuery {
                reason: format!("trade {:?} is missing or already terminal", trade.id),
            })?;
        *slot = trade.clone();
        Ok(())
    }

    fn active_trades(&self, ticker: &str) -> Result<Vec<Trade>, SmcError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|t| t.ticker == ticker && t.is_active())
            .cloned()
            .collect())
    }

    fn trades_for(&self, ticker: &str) -> Result<Vec<Trade>, SmcError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|t| t.ticker == ticker)
            .cloned()
            .collect())
    }

    fn all_trades(&self) -> Result<Vec<Trade>, SmcError> {
        Ok(self.lock()?.clone())
    }
}
