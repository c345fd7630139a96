//! Replay of stored active trades through finalized bars.
//!
//! Live polling sees only cumulative snapshots, so a trade can sit in a state
//! the daily bars have already moved past. The audit re-drives every active
//! trade through the bars after its signal date with same-bar exits enabled
//! and persists whatever state that produces.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::error::SmcError;
use crate::domain::lifecycle::{replay, ExitResolution};
use crate::domain::observation::PriceObservation;
use crate::domain::ticker_data::normalize_bars;
use crate::domain::trade::{Trade, TradeStatus};
use crate::ports::data_port::DataPort;
use crate::ports::trade_store::TradeStore;

#[derive(Debug, Default)]
pub struct AuditSummary {
    pub examined: usize,
    /// Trades whose state changed, as persisted.
    pub updated: Vec<Trade>,
    pub failures: Vec<(String, SmcError)>,
}

/// Replay every active trade in `store` through bars up to `through`.
pub fn audit_active_trades(
    data: &dyn DataPort,
    store: &dyn TradeStore,
    through: NaiveDate,
) -> Result<AuditSummary, SmcError> {
    let mut summary = AuditSummary::default();
    let active: Vec<Trade> = store
        .all_trades()?
        .into_iter()
        .filter(Trade::is_active)
        .collect();

    for trade in active {
        summary.examined += 1;
        match audit_trade(data, store, &trade, through) {
            Ok(Some(updated)) => summary.updated.push(updated),
            Ok(None) => {}
            Err(e) => {
                warn!(ticker = %trade.ticker, id = ?trade.id, error = %e, "audit skipped trade");
                summary.failures.push((trade.ticker.clone(), e));
            }
        }
    }

    info!(
        examined = summary.examined,
        updated = summary.updated.len(),
        failures = summary.failures.len(),
        "audit complete"
    );
    Ok(summary)
}

fn audit_trade(
    data: &dyn DataPort,
    store: &dyn TradeStore,
    trade: &Trade,
    through: NaiveDate,
) -> Result<Option<Trade>, SmcError> {
    let Some(after_signal) = trade.signal_date.succ_opt() else {
        return Ok(None);
    };
    // A filled trade is only checked for exits from its fill day on.
    let first_day = match (trade.status, trade.entry_date) {
        (TradeStatus::Open, Some(filled)) => filled.max(after_signal),
        _ => after_signal,
    };
    if first_day > through {
        return Ok(None);
    }

    let bars = normalize_bars(data.fetch_bars(&trade.ticker, first_day, through)?);
    let observations: Vec<PriceObservation> = bars.iter().map(PriceObservation::from_bar).collect();
    let outcome = replay(trade, &observations, ExitResolution::SameObservation);

    if outcome.trade == *trade {
        return Ok(None);
    }
    store.update(&outcome.trade)?;
    info!(
        ticker = %trade.ticker,
        id = ?trade.id,
        from = %trade.status,
        to = %outcome.trade.status,
        "audit corrected trade"
    );
    Ok(Some(outcome.trade))
}
