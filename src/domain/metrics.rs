//! Backtest statistics over the materialized trades.

use std::collections::BTreeMap;

use crate::domain::trade::{Trade, TradeOutcome, TradeStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestMetrics {
    pub total_trades: usize,
    pub closed: usize,
    pub wins: usize,
    pub losses: usize,
    pub voided: usize,
    pub still_open: usize,
    /// POTENTIAL or PENDING at the end of the replay.
    pub unfilled: usize,
    /// Wins over closed trades.
    pub win_rate: f64,
    pub total_pnl: f64,
    /// Sum of per-trade returns on entry price, net of round-trip commission.
    pub total_return: f64,
    pub avg_r_multiple: f64,
    pub profit_factor: f64,
}

impl BacktestMetrics {
    pub fn compute(trades: &[Trade], commission_pct: f64) -> Self {
        let round_trip_cost = 2.0 * commission_pct / 100.0;

        let mut closed = 0usize;
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut voided = 0usize;
        let mut still_open = 0usize;
        let mut unfilled = 0usize;
        let mut total_pnl = 0.0_f64;
        let mut total_return = 0.0_f64;
        let mut total_r = 0.0_f64;
        let mut gross_win = 0.0_f64;
        let mut gross_loss = 0.0_f64;

        for trade in trades {
            match trade.status {
                TradeStatus::Closed => {
                    closed += 1;
                    match trade.outcome {
                        Some(TradeOutcome::Win) => wins += 1,
                        Some(TradeOutcome::Loss) => losses += 1,
                        _ => {}
                    }
                    let pnl = trade.pnl.unwrap_or_default();
                    total_pnl += pnl;
                    if pnl > 0.0 {
                        gross_win += pnl;
                    } else {
                        gross_loss += pnl.abs();
                    }
                    total_return += trade.return_fraction().unwrap_or_default() - round_trip_cost;
                    total_r += trade.r_multiple().unwrap_or_default();
                }
                TradeStatus::Skipped => voided += 1,
                TradeStatus::Open => still_open += 1,
                TradeStatus::Potential | TradeStatus::Pending => unfilled += 1,
            }
        }

        let win_rate = if closed > 0 {
            wins as f64 / closed as f64
        } else {
            0.0
        };

        let avg_r_multiple = if closed > 0 {
            total_r / closed as f64
        } else {
            0.0
        };

        let profit_factor = if gross_loss > 0.0 {
            gross_win / gross_loss
        } else if gross_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        BacktestMetrics {
            total_trades: trades.len(),
            closed,
            wins,
            losses,
            voided,
            still_open,
            unfilled,
            win_rate,
            total_pnl,
            total_return,
            avg_r_multiple,
            profit_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerResult {
    pub ticker: String,
    pub total_trades: usize,
    pub closed: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
}

impl TickerResult {
    /// Per-ticker summary, sorted by ticker.
    pub fn compute_per_ticker(trades: &[Trade]) -> Vec<TickerResult> {
        let mut by_ticker: BTreeMap<&str, Vec<&Trade>> = BTreeMap::new();
        for trade in trades {
            by_ticker.entry(trade.ticker.as_str()).or_default().push(trade);
        }

        by_ticker
            .into_iter()
            .map(|(ticker, ts)| {
                let closed: Vec<_> = ts
                    .iter()
                    .filter(|t| t.status == TradeStatus::Closed)
                    .collect();
                let wins = closed
                    .iter()
                    .filter(|t| t.outcome == Some(TradeOutcome::Win))
                    .count();
                TickerResult {
                    ticker: ticker.to_string(),
                    total_trades: ts.len(),
                    closed: closed.len(),
                    wins,
                    win_rate: if closed.is_empty() {
                        0.0
                    } else {
                        wins as f64 / closed.len() as f64
                    },
                    total_pnl: closed.iter().filter_map(|t| t.pnl).sum(),
                }
            })
            .collect()
    }
}
