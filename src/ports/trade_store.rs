//! Trade persistence port trait.

use crate::domain::error::SmcError;
use crate::domain::trade::Trade;

pub trait TradeStore {
    /// Insert `trade` unless it would break the active-trade uniqueness rule
    /// (one active trade per ticker and signal date, or per ticker when
    /// `single_active_per_ticker` is set). The check and the insert are one
    /// atomic step. Returns the stored trade with its id, or `None` when the
    /// trade was dropped as a duplicate.
    fn create_if_absent(
        &self,
        trade: &Trade,
        single_active_per_ticker: bool,
    ) -> Result<Option<Trade>, SmcError>;

    /// Persist one transition. Applied as a unit: on error the stored row is
    /// unchanged. Rows already in a terminal state are never rewritten.
    fn update(&self, trade: &Trade) -> Result<(), SmcError>;

    fn active_trades(&self, ticker: &str) -> Result<Vec<Trade>, SmcError>;

    /// Every trade for `ticker`, any status, oldest first.
    fn trades_for(&self, ticker: &str) -> Result<Vec<Trade>, SmcError>;

    fn all_trades(&self) -> Result<Vec<Trade>, SmcError>;
}
