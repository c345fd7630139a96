//! Trade record and lifecycle status types.

use chrono::NaiveDate;

use crate::domain::patterns::Direction;
use crate::domain::signal::Setup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeStatus {
    /// Discovered before the session, awaiting validation at the open.
    Potential,
    /// Working limit order.
    Pending,
    Open,
    Closed,
    Skipped,
}

impl TradeStatus {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TradeStatus::Potential | TradeStatus::Pending | TradeStatus::Open
        )
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradeStatus::Potential => "POTENTIAL",
            TradeStatus::Pending => "PENDING",
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
            TradeStatus::Skipped => "SKIPPED",
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "POTENTIAL" => Ok(TradeStatus::Potential),
            "PENDING" => Ok(TradeStatus::Pending),
            "OPEN" => Ok(TradeStatus::Open),
            "CLOSED" => Ok(TradeStatus::Closed),
            "SKIPPED" => Ok(TradeStatus::Skipped),
            other => Err(format!("unknown trade status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeOutcome {
    Win,
    Loss,
    Void,
}

impl TradeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeOutcome::Win => "WIN",
            TradeOutcome::Loss => "LOSS",
            TradeOutcome::Void => "VOID",
        }
    }
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for TradeOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WIN" => Ok(TradeOutcome::Win),
            "LOSS" => Ok(TradeOutcome::Loss),
            "VOID" => Ok(TradeOutcome::Void),
            other => Err(format!("unknown trade outcome '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    /// Store-assigned row id; `None` until persisted.
    pub id: Option<i64>,
    pub ticker: String,
    pub signal_date: NaiveDate,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub status: TradeStatus,
    pub outcome: Option<TradeOutcome>,
    pub entry_date: Option<NaiveDate>,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub pnl: Option<f64>,
    pub reason: Option<String>,
}

impl Trade {
    pub fn from_setup(setup: &Setup, status: TradeStatus) -> Self {
        Trade {
            id: None,
            ticker: setup.ticker.clone(),
            signal_date: setup.signal_date,
            direction: setup.direction,
            entry_price: setup.entry_price,
            stop_price: setup.stop_price,
            target_price: setup.target_price,
            status,
            outcome: None,
            entry_date: None,
            exit_date: None,
            exit_price: None,
            pnl: None,
            reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn risk(&self) -> f64 {
        match self.direction {
            Direction::Bullish => self.entry_price - self.stop_price,
            Direction::Bearish => self.stop_price - self.entry_price,
        }
    }

    /// Realized pnl in units of initial risk.
    pub fn r_multiple(&self) -> Option<f64> {
        let risk = self.risk();
        match self.pnl {
            Some(pnl) if risk > 0.0 => Some(pnl / risk),
            _ => None,
        }
    }

    /// Realized pnl as a fraction of the entry price.
    pub fn return_fraction(&self) -> Option<f64> {
        match self.pnl {
            Some(pnl) if self.entry_price > 0.0 => Some(pnl / self.entry_price),
            _ => None,
        }
    }
}

/// Transition events rendered by the alert transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    SetupDetected(Trade),
    EntryFilled(Trade),
    Exited(Trade),
}

impl TradeEvent {
    pub fn trade(&self) -> &Trade {
        match self {
            TradeEvent::SetupDetected(t) | TradeEvent::EntryFilled(t) | TradeEvent::Exited(t) => t,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TradeEvent::SetupDetected(_) => "setup",
            TradeEvent::EntryFilled(_) => "entry",
            TradeEvent::Exited(_) => "exit",
        }
    }
}

impl std::fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeEvent::SetupDetected(t) => write!(
                f,
                "NEW SIGNAL: {} | Buy Limit: {:.2} | SL: {:.2} | TP: {:.2}",
                t.ticker, t.entry_price, t.stop_price, t.target_price
            ),
            TradeEvent::EntryFilled(t) => {
                write!(f, "ENTRY FILLED: {} @ {:.2}", t.ticker, t.entry_price)
            }
            TradeEvent::Exited(t) => {
                let label = match t.outcome {
                    Some(TradeOutcome::Win) => "TARGET HIT",
                    _ => "STOP LOSS HIT",
                };
                write!(
                    f,
                    "{}: {} @ {:.2} (pnl {:+.2})",
                    label,
                    t.ticker,
                    t.exit_price.unwrap_or_default(),
                    t.pnl.unwrap_or_default()
                )
            }
        }
    }
}
