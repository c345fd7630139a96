//! Deterministic historical replay.
//!
//! Dates are visited in ascending order and, within a date, tickers in the
//! order they were supplied. On each bar the ticker's active trades advance
//! first, then the bar is checked for a freshly confirmed setup, so a setup
//! can never be filled by the bar that created it.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::lifecycle::{admits, advance, materialize, ExitResolution, LifecycleConfig};
use crate::domain::observation::PriceObservation;
use crate::domain::patterns::DetectorConfig;
use crate::domain::signal::{generate_setup, SignalConfig};
use crate::domain::ticker_data::TickerData;
use crate::domain::trade::{Trade, TradeEvent};

/// Calendar days of history loaded before `start_date` so the EMA is warm.
pub const DEFAULT_WARMUP_DAYS: i64 = 400;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub warmup_days: i64,
    pub detector: DetectorConfig,
    /// Variants evaluated on every bar, in order. When two variants fire on
    /// the same bar the later setup is dropped as a duplicate.
    pub signals: Vec<SignalConfig>,
    pub lifecycle: LifecycleConfig,
    /// Per side, in percent of the entry price.
    pub commission_pct: f64,
}

impl BacktestConfig {
    /// First date of history to load for indicator warmup.
    pub fn history_start(&self) -> NaiveDate {
        self.start_date - chrono::Duration::days(self.warmup_days.max(0))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestResult {
    /// Every materialized trade in creation order; ids are 1-based.
    pub trades: Vec<Trade>,
    pub events: Vec<TradeEvent>,
    pub setups_generated: usize,
    pub duplicates_dropped: usize,
    pub dates_processed: usize,
}

pub fn run_backtest(
    tickers: &[TickerData],
    timeline: &[NaiveDate],
    config: &BacktestConfig,
) -> BacktestResult {
    let mut result = BacktestResult::default();

    for &date in timeline {
        if date < config.start_date || date > config.end_date {
            continue;
        }
        result.dates_processed += 1;

        for td in tickers {
            let Some(index) = td.get_bar_index(date) else {
                continue;
            };
            let obs = PriceObservation::from_bar(&td.bars[index]);

            for trade in result
                .trades
                .iter_mut()
                .filter(|t| t.is_active() && t.ticker == td.ticker)
            {
                let step = advance(trade, &obs, ExitResolution::SameObservation);
                if step.trade != *trade {
                    debug!(
                        ticker = %td.ticker,
                        %date,
                        from = %trade.status,
                        to = %step.trade.status,
                        "trade transition"
                    );
                }
                *trade = step.trade;
                result.events.extend(step.events);
            }

            for signal in &config.signals {
                let Some(setup) =
                    generate_setup(&td.ticker, &td.bars, &td.annotations, index, signal)
                else {
                    continue;
                };
                result.setups_generated += 1;

                let Some(mut trade) = materialize(&setup, config.lifecycle.initial_status) else {
                    continue;
                };
                if !admits(
                    &result.trades,
                    &trade,
                    config.lifecycle.single_active_per_ticker,
                ) {
                    result.duplicates_dropped += 1;
                    continue;
                }
                trade.id = Some(result.trades.len() as i64 + 1);
                result.events.push(TradeEvent::SetupDetected(trade.clone()));
                result.trades.push(trade);
            }
        }
    }

    result
}
