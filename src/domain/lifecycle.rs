//! Trade lifecycle state machine.
//!
//! ```text
//!  setup ──► POTENTIAL ──(open through stop/target)──► SKIPPED(VOID)
//!               │  └──(open ≤ entry or low ≤ entry)──┐
//!               ▼                                     ▼
//!            PENDING ─────────(low ≤ entry)────────► OPEN ──(low ≤ stop)──► CLOSED(LOSS)
//!                                                      └───(high ≥ target)─► CLOSED(WIN)
//! ```
//!
//! Bullish levels shown; bearish setups use the mirrored comparisons. When a
//! single observation touches both stop and target the stop wins, in every
//! driver. [`advance`] is pure: it returns the next version of the trade and
//! the events to announce, and leaves persistence to the caller.

use chrono::NaiveDate;

use crate::domain::observation::PriceObservation;
use crate::domain::patterns::Direction;
use crate::domain::signal::Setup;
use crate::domain::trade::{Trade, TradeEvent, TradeOutcome, TradeStatus};

/// Whether a fill and an exit may both happen on one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitResolution {
    /// Finalized bars: a bar that fills the entry may also close the trade.
    SameObservation,
    /// Cumulative intraday snapshots: exits are checked from the next poll on.
    NextObservation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub trade: Trade,
    pub events: Vec<TradeEvent>,
}

impl Transition {
    fn unchanged(trade: &Trade) -> Self {
        Transition {
            trade: trade.clone(),
            events: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Status a fresh trade starts in: `Potential` or `Pending`.
    pub initial_status: TradeStatus,
    /// Refuse new setups while the ticker has any active trade.
    pub single_active_per_ticker: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            initial_status: TradeStatus::Potential,
            single_active_per_ticker: false,
        }
    }
}

/// Whether `candidate` may join `existing` without breaking uniqueness:
/// at most one active trade per (ticker, signal date), or per ticker when
/// `single_active_per_ticker` is set.
pub fn admits(existing: &[Trade], candidate: &Trade, single_active_per_ticker: bool) -> bool {
    !existing.iter().any(|t| {
        t.is_active()
            && t.ticker == candidate.ticker
            && (single_active_per_ticker || t.signal_date == candidate.signal_date)
    })
}

/// Turn a setup into a new trade record, or `None` for an ill-formed setup.
pub fn materialize(setup: &Setup, initial_status: TradeStatus) -> Option<Trade> {
    if !(setup.risk() > 0.0) {
        return None;
    }
    let status = match initial_status {
        TradeStatus::Pending => TradeStatus::Pending,
        _ => TradeStatus::Potential,
    };
    Some(Trade::from_setup(setup, status))
}

/// Advance one trade by one observation.
pub fn advance(trade: &Trade, obs: &PriceObservation, resolution: ExitResolution) -> Transition {
    if trade.status.is_terminal() || obs.date <= trade.signal_date {
        return Transition::unchanged(trade);
    }
    // An open trade cannot exit on prices from before its fill.
    if trade.status == TradeStatus::Open && trade.entry_date.is_some_and(|filled| obs.date < filled) {
        return Transition::unchanged(trade);
    }
    let Some((low, high)) = obs.range() else {
        return Transition::unchanged(trade);
    };

    let mut next = trade.clone();
    let mut events = Vec::new();
    let mut filled_now = false;

    match next.status {
        TradeStatus::Potential => match validate(&next, obs.reference(), low, high) {
            Validation::Void(reason) => {
                void(&mut next, obs.date, reason);
                return Transition {
                    trade: next,
                    events,
                };
            }
            Validation::Fill => {
                fill(&mut next, obs.date);
                events.push(TradeEvent::EntryFilled(next.clone()));
                filled_now = true;
            }
            Validation::Wait => {
                next.status = TradeStatus::Pending;
            }
        },
        TradeStatus::Pending => {
            if touches_entry(&next, low, high) {
                fill(&mut next, obs.date);
                events.push(TradeEvent::EntryFilled(next.clone()));
                filled_now = true;
            }
        }
        _ => {}
    }

    let may_exit = match next.status {
        TradeStatus::Open => !filled_now || resolution == ExitResolution::SameObservation,
        _ => false,
    };
    if may_exit {
        let suffix = if filled_now { " on entry bar" } else { "" };
        if touches_stop(&next, low, high) {
            let price = next.stop_price;
            close(&mut next, TradeOutcome::Loss, price, obs.date, format!("stop hit{suffix}"));
            events.push(TradeEvent::Exited(next.clone()));
        } else if touches_target(&next, low, high) {
            let price = next.target_price;
            close(&mut next, TradeOutcome::Win, price, obs.date, format!("target hit{suffix}"));
            events.push(TradeEvent::Exited(next.clone()));
        }
    }

    Transition {
        trade: next,
        events,
    }
}

/// Feed observations in order until the trade reaches a terminal state.
pub fn replay<'a, I>(trade: &Trade, observations: I, resolution: ExitResolution) -> Transition
where
    I: IntoIterator<Item = &'a PriceObservation>,
{
    let mut current = Transition::unchanged(trade);
    for obs in observations {
        if current.trade.status.is_terminal() {
            break;
        }
        let step = advance(&current.trade, obs, resolution);
        current.trade = step.trade;
        current.events.extend(step.events);
    }
    current
}

enum Validation {
    Void(&'static str),
    Fill,
    Wait,
}

fn validate(trade: &Trade, reference: Option<f64>, low: f64, high: f64) -> Validation {
    let bullish = trade.direction == Direction::Bullish;
    match reference {
        Some(price) => {
            let through_stop = if bullish {
                price <= trade.stop_price
            } else {
                price >= trade.stop_price
            };
            let through_target = if bullish {
                price >= trade.target_price
            } else {
                price <= trade.target_price
            };
            let at_entry = if bullish {
                price <= trade.entry_price
            } else {
                price >= trade.entry_price
            };

            if through_stop {
                Validation::Void("opened through stop before entry")
            } else if through_target {
                Validation::Void("opened through target before entry")
            } else if at_entry || touches_entry(trade, low, high) {
                Validation::Fill
            } else {
                Validation::Wait
            }
        }
        None => {
            if touches_stop(trade, low, high) {
                Validation::Void("traded through stop before entry")
            } else if touches_target(trade, low, high) {
                Validation::Void("traded through target before entry")
            } else if touches_entry(trade, low, high) {
                Validation::Fill
            } else {
                Validation::Wait
            }
        }
    }
}

fn touches_entry(trade: &Trade, low: f64, high: f64) -> bool {
    match trade.direction {
        Direction::Bullish => low <= trade.entry_price,
        Direction::Bearish => high >= trade.entry_price,
    }
}

fn touches_stop(trade: &Trade, low: f64, high: f64) -> bool {
    match trade.direction {
        Direction::Bullish => low <= trade.stop_price,
        Direction::Bearish => high >= trade.stop_price,
    }
}

fn touches_target(trade: &Trade, low: f64, high: f64) -> bool {
    match trade.direction {
        Direction::Bullish => high >= trade.target_price,
        Direction::Bearish => low <= trade.target_price,
    }
}

fn fill(trade: &mut Trade, date: NaiveDate) {
    trade.status = TradeStatus::Open;
    trade.entry_date = Some(date);
}

fn void(trade: &mut Trade, date: NaiveDate, reason: &str) {
    trade.status = TradeStatus::Skipped;
    trade.outcome = Some(TradeOutcome::Void);
    trade.exit_date = Some(date);
    trade.reason = Some(reason.to_string());
}

fn close(trade: &mut Trade, outcome: TradeOutcome, price: f64, date: NaiveDate, reason: String) {
    let pnl = match trade.direction {
        Direction::Bullish => price - trade.entry_price,
        Direction::Bearish => trade.entry_price - price,
    };
    trade.status = TradeStatus::Closed;
    trade.outcome = Some(outcome);
    trade.exit_price = Some(price);
    trade.exit_date = Some(date);
    trade.pnl = Some(pnl);
    trade.reason = Some(reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, n).unwrap()
    }

    fn setup(direction: Direction) -> Setup {
        match direction {
            Direction::Bullish => Setup {
                ticker: "POLYCAB".into(),
                signal_date: day(1),
                entry_price: 100.0,
                stop_price: 95.0,
                target_price: 110.0,
                direction,
            },
            Direction::Bearish => Setup {
                ticker: "POLYCAB".into(),
                signal_date: day(1),
                entry_price: 100.0,
                stop_price: 105.0,
                target_price: 90.0,
                direction,
            },
        }
    }

    fn trade(status: TradeStatus) -> Trade {
        Trade::from_setup(&setup(Direction::Bullish), status)
    }

    fn bar(d: u32, open: f64, high: f64, low: f64, close: f64) -> PriceObservation {
        PriceObservation {
            date: day(d),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            last: Some(close),
        }
    }

    #[test]
    fn potential_wide_bar_resolves_to_loss() {
        let t = trade(TradeStatus::Potential);
        let step = advance(&t, &bar(2, 100.0, 111.0, 90.0, 105.0), ExitResolution::SameObservation);

        assert_eq!(step.trade.status, TradeStatus::Closed);
        assert_eq!(step.trade.outcome, Some(TradeOutcome::Loss));
        assert_relative_eq!(step.trade.exit_price.unwrap(), 95.0);
        assert_relative_eq!(step.trade.pnl.unwrap(), -5.0);
        assert_eq!(step.trade.entry_date, Some(day(2)));
        assert_eq!(step.events.len(), 2);
        assert!(matches!(step.events[0], TradeEvent::EntryFilled(_)));
        assert!(matches!(step.events[1], TradeEvent::Exited(_)));
    }

    #[test]
    fn potential_gap_below_stop_is_voided() {
        let t = trade(TradeStatus::Potential);
        let step = advance(&t, &bar(2, 94.0, 96.0, 93.0, 95.5), ExitResolution::SameObservation);
        assert_eq!(step.trade.status, TradeStatus::Skipped);
        assert_eq!(step.trade.outcome, Some(TradeOutcome::Void));
        assert!(step.trade.entry_date.is_none());
        assert!(step.trade.pnl.is_none());
        assert!(step.events.is_empty());
    }

    #[test]
    fn potential_gap_above_target_is_voided() {
        let t = trade(TradeStatus::Potential);
        let step = advance(&t, &bar(2, 111.0, 113.0, 108.0, 112.0), ExitResolution::SameObservation);
        assert_eq!(step.trade.status, TradeStatus::Skipped);
        assert_eq!(step.trade.reason.as_deref(), Some("opened through target before entry"));
    }

    #[test]
    fn potential_open_at_or_below_entry_fills() {
        let t = trade(TradeStatus::Potential);
        let step = advance(&t, &bar(2, 99.0, 101.0, 98.0, 100.5), ExitResolution::SameObservation);
        assert_eq!(step.trade.status, TradeStatus::Open);
        assert_eq!(step.trade.entry_date, Some(day(2)));
    }

    #[test]
    fn potential_without_touch_becomes_pending() {
        let t = trade(TradeStatus::Potential);
        let step = advance(&t, &bar(2, 104.0, 106.0, 102.0, 105.0), ExitResolution::SameObservation);
        assert_eq!(step.trade.status, TradeStatus::Pending);
        assert!(step.events.is_empty());
    }

    #[test]
    fn potential_snapshot_without_reference_uses_range() {
        let t = trade(TradeStatus::Potential);
        let obs = PriceObservation::snapshot(day(2), Some(94.0), Some(101.0), None);
        let step = advance(&t, &obs, ExitResolution::NextObservation);
        assert_eq!(step.trade.status, TradeStatus::Skipped);
        assert_eq!(step.trade.reason.as_deref(), Some("traded through stop before entry"));
    }

    #[test]
    fn pending_fills_on_low_touch() {
        let t = trade(TradeStatus::Pending);
        let step = advance(&t, &bar(2, 103.0, 104.0, 100.0, 101.0), ExitResolution::SameObservation);
        assert_eq!(step.trade.status, TradeStatus::Open);
        assert_eq!(step.events.len(), 1);
    }

    #[test]
    fn pending_stays_pending_above_entry() {
        let t = trade(TradeStatus::Pending);
        let step = advance(&t, &bar(2, 103.0, 104.0, 100.01, 101.0), ExitResolution::SameObservation);
        assert_eq!(step.trade, t);
        assert!(step.events.is_empty());
    }

    #[test]
    fn open_stop_wins_tie() {
        let mut t = trade(TradeStatus::Open);
        t.entry_date = Some(day(2));
        let step = advance(&t, &bar(3, 100.0, 111.0, 94.0, 105.0), ExitResolution::NextObservation);
        assert_eq!(step.trade.outcome, Some(TradeOutcome::Loss));
        assert_eq!(step.trade.reason.as_deref(), Some("stop hit"));
    }

    #[test]
    fn open_target_hit() {
        let mut t = trade(TradeStatus::Open);
        t.entry_date = Some(day(2));
        let step = advance(&t, &bar(3, 104.0, 110.0, 103.0, 109.0), ExitResolution::NextObservation);
        assert_eq!(step.trade.status, TradeStatus::Closed);
        assert_eq!(step.trade.outcome, Some(TradeOutcome::Win));
        assert_relative_eq!(step.trade.exit_price.unwrap(), 110.0);
        assert_relative_eq!(step.trade.pnl.unwrap(), 10.0);
    }

    #[test]
    fn next_observation_defers_exit_after_fill() {
        let t = trade(TradeStatus::Pending);
        let obs = PriceObservation::snapshot(day(2), Some(90.0), Some(111.0), Some(96.0));
        let step = advance(&t, &obs, ExitResolution::NextObservation);
        assert_eq!(step.trade.status, TradeStatus::Open);
        assert_eq!(step.events.len(), 1);
    }

    #[test]
    fn terminal_trades_never_change() {
        let t = trade(TradeStatus::Potential);
        let closed = advance(&t, &bar(2, 100.0, 111.0, 90.0, 105.0), ExitResolution::SameObservation).trade;
        let again = advance(&closed, &bar(3, 100.0, 120.0, 80.0, 100.0), ExitResolution::SameObservation);
        assert_eq!(again.trade, closed);
        assert!(again.events.is_empty());
    }

    #[test]
    fn signal_day_observation_is_ignored() {
        let t = trade(TradeStatus::Pending);
        let step = advance(&t, &bar(1, 100.0, 101.0, 90.0, 95.0), ExitResolution::SameObservation);
        assert_eq!(step.trade, t);
    }

    #[test]
    fn open_trade_ignores_bars_before_its_fill() {
        let mut t = trade(TradeStatus::Open);
        t.entry_date = Some(day(3));
        let early = advance(&t, &bar(2, 104.0, 112.0, 101.0, 110.0), ExitResolution::SameObservation);
        assert_eq!(early.trade, t);
        assert!(early.events.is_empty());

        let fill_day = advance(&t, &bar(3, 101.0, 102.0, 94.0, 96.0), ExitResolution::SameObservation);
        assert_eq!(fill_day.trade.outcome, Some(TradeOutcome::Loss));
        assert_eq!(fill_day.trade.exit_date, Some(day(3)));
    }

    #[test]
    fn empty_snapshot_is_no_update() {
        let t = trade(TradeStatus::Pending);
        let obs = PriceObservation::snapshot(day(2), None, Some(0.0), None);
        assert_eq!(advance(&t, &obs, ExitResolution::NextObservation).trade, t);
    }

    #[test]
    fn bearish_setup_mirrors() {
        let t = Trade::from_setup(&setup(Direction::Bearish), TradeStatus::Pending);
        let filled = advance(&t, &bar(2, 98.0, 100.5, 97.0, 99.0), ExitResolution::SameObservation);
        assert_eq!(filled.trade.status, TradeStatus::Open);

        let won = advance(&filled.trade, &bar(3, 95.0, 96.0, 89.0, 90.0), ExitResolution::SameObservation);
        assert_eq!(won.trade.outcome, Some(TradeOutcome::Win));
        assert_relative_eq!(won.trade.pnl.unwrap(), 10.0);
    }

    #[test]
    fn materialize_rejects_non_positive_risk() {
        let mut s = setup(Direction::Bullish);
        s.stop_price = 100.0;
        assert!(materialize(&s, TradeStatus::Potential).is_none());
        let ok = materialize(&setup(Direction::Bullish), TradeStatus::Pending).unwrap();
        assert_eq!(ok.status, TradeStatus::Pending);
    }

    #[test]
    fn admits_enforces_one_active_per_day() {
        let first = trade(TradeStatus::Potential);
        let duplicate = trade(TradeStatus::Potential);
        assert!(admits(&[], &first, false));
        assert!(!admits(&[first.clone()], &duplicate, false));

        let mut later = trade(TradeStatus::Potential);
        later.signal_date = day(5);
        assert!(admits(&[first.clone()], &later, false));
        assert!(!admits(&[first.clone()], &later, true));

        let mut done = first;
        done.status = TradeStatus::Closed;
        assert!(admits(&[done], &duplicate, true));
    }

    #[test]
    fn replay_stops_at_terminal_state() {
        let t = trade(TradeStatus::Pending);
        let bars = [
            bar(2, 103.0, 104.0, 101.0, 103.5),
            bar(3, 102.0, 103.0, 99.5, 101.0),
            bar(4, 104.0, 110.5, 103.0, 110.0),
            bar(5, 100.0, 100.0, 80.0, 85.0),
        ];
        let result = replay(&t, bars.iter(), ExitResolution::SameObservation);
        assert_eq!(result.trade.outcome, Some(TradeOutcome::Win));
        assert_eq!(result.trade.entry_date, Some(day(3)));
        assert_eq!(result.trade.exit_date, Some(day(4)));
        assert_eq!(result.events.len(), 2);
    }
}
