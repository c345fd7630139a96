//! Smart-money pattern detection: swing points, fair-value gaps and order blocks.
//!
//! Detection is a single forward pass. [`PatternScanner`] keeps a sliding window
//! of the last `2w+1` bars for swings and the last 3 bars for gaps, and emits
//! events as soon as each pattern is confirmed. A swing at `j` is confirmed once
//! bar `j+w` arrives; a gap whose first bar is `i-2` is confirmed at bar `i`, and
//! the same event names the order-block candle at `i-2` when there is one.
//!
//! [`annotate`] replays a whole sequence through the scanner and returns one
//! [`Annotation`] per input bar.

use std::collections::VecDeque;

use crate::domain::ema::calculate_ema;
use crate::domain::ohlcv::Bar;

pub const DEFAULT_SWING_WINDOW: usize = 5;
pub const DEFAULT_EMA_PERIOD: usize = 200;

/// Bars between a gap's first candle and the candle that confirms it.
pub const GAP_LAG: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Bullish => f.pad("BULL"),
            Direction::Bearish => f.pad("BEAR"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BULL" | "BULLISH" => Ok(Direction::Bullish),
            "BEAR" | "BEARISH" => Ok(Direction::Bearish),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwingPoint {
    pub index: usize,
    pub kind: SwingKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FairValueGap {
    /// First candle of the three-bar formation (`i-2`).
    pub origin_index: usize,
    /// Candle whose close confirms the gap (`i`).
    pub confirm_index: usize,
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
}

/// A confirmed gap together with the order block it implicates, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapConfirmation {
    pub gap: FairValueGap,
    pub order_block: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternEvent {
    Swing(SwingPoint),
    Gap(GapConfirmation),
}

/// Per-bar pattern flags, aligned index-for-index with the bar sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub swing_high: bool,
    pub swing_low: bool,
    pub bullish_fvg: bool,
    pub bearish_fvg: bool,
    pub fvg_top: Option<f64>,
    pub fvg_bottom: Option<f64>,
    pub bullish_ob: bool,
    pub bearish_ob: bool,
    pub ema: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    pub swing_window: usize,
    pub ema_period: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            swing_window: DEFAULT_SWING_WINDOW,
            ema_period: DEFAULT_EMA_PERIOD,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl From<&Bar> for Candle {
    fn from(bar: &Bar) -> Self {
        Candle {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
        }
    }
}

/// Streaming detector. Feed bars in timestamp order with [`PatternScanner::push`].
#[derive(Debug, Clone)]
pub struct PatternScanner {
    window: usize,
    swing_buf: VecDeque<Candle>,
    gap_buf: VecDeque<Candle>,
    pushed: usize,
}

impl PatternScanner {
    pub fn new(swing_window: usize) -> Self {
        PatternScanner {
            window: swing_window,
            swing_buf: VecDeque::with_capacity(2 * swing_window + 1),
            gap_buf: VecDeque::with_capacity(GAP_LAG + 1),
            pushed: 0,
        }
    }

    /// Number of bars consumed so far.
    pub fn len(&self) -> usize {
        self.pushed
    }

    pub fn is_empty(&self) -> bool {
        self.pushed == 0
    }

    /// Consume the next bar and return every pattern it confirms.
    pub fn push(&mut self, bar: &Bar) -> Vec<PatternEvent> {
        let candle = Candle::from(bar);
        let index = self.pushed;
        self.pushed += 1;

        let mut events = Vec::new();
        self.push_swing(candle, index, &mut events);
        self.push_gap(candle, index, &mut events);
        events
    }

    fn push_swing(&mut self, candle: Candle, index: usize, events: &mut Vec<PatternEvent>) {
        let span = 2 * self.window + 1;
        self.swing_buf.push_back(candle);
        if self.swing_buf.len() > span {
            self.swing_buf.pop_front();
        }
        if self.swing_buf.len() < span {
            return;
        }

        let center = self.swing_buf[self.window];
        let center_index = index - self.window;

        if self.swing_buf.iter().all(|c| c.high <= center.high) {
            events.push(PatternEvent::Swing(SwingPoint {
                index: center_index,
                kind: SwingKind::High,
            }));
        }
        if self.swing_buf.iter().all(|c| c.low >= center.low) {
            events.push(PatternEvent::Swing(SwingPoint {
                index: center_index,
                kind: SwingKind::Low,
            }));
        }
    }

    fn push_gap(&mut self, candle: Candle, index: usize, events: &mut Vec<PatternEvent>) {
        self.gap_buf.push_back(candle);
        if self.gap_buf.len() > GAP_LAG + 1 {
            self.gap_buf.pop_front();
        }
        if self.gap_buf.len() < GAP_LAG + 1 {
            return;
        }

        let origin = self.gap_buf[0];
        let origin_index = index - GAP_LAG;

        if candle.low > origin.high {
            events.push(PatternEvent::Gap(GapConfirmation {
                gap: FairValueGap {
                    origin_index,
                    confirm_index: index,
                    direction: Direction::Bullish,
                    top: candle.low,
                    bottom: origin.high,
                },
                order_block: (origin.close < origin.open).then_some(origin_index),
            }));
        }
        if candle.high < origin.low {
            events.push(PatternEvent::Gap(GapConfirmation {
                gap: FairValueGap {
                    origin_index,
                    confirm_index: index,
                    direction: Direction::Bearish,
                    top: origin.low,
                    bottom: candle.high,
                },
                order_block: (origin.close > origin.open).then_some(origin_index),
            }));
        }
    }
}

/// Run the scanner over a whole sequence and collect every event.
pub fn detect_events(bars: &[Bar], swing_window: usize) -> Vec<PatternEvent> {
    let mut scanner = PatternScanner::new(swing_window);
    bars.iter().flat_map(|bar| scanner.push(bar)).collect()
}

/// Annotate a bar sequence with pattern flags and the trend EMA.
pub fn annotate(bars: &[Bar], config: &DetectorConfig) -> Vec<Annotation> {
    let mut annotations: Vec<Annotation> = calculate_ema(bars, config.ema_period)
        .into_iter()
        .map(|ema| Annotation {
            ema,
            ..Annotation::default()
        })
        .collect();

    for event in detect_events(bars, config.swing_window) {
        match event {
            PatternEvent::Swing(SwingPoint { index, kind }) => match kind {
                SwingKind::High => annotations[index].swing_high = true,
                SwingKind::Low => annotations[index].swing_low = true,
            },
            PatternEvent::Gap(GapConfirmation { gap, order_block }) => {
                let at = &mut annotations[gap.confirm_index];
                match gap.direction {
                    Direction::Bullish => at.bullish_fvg = true,
                    Direction::Bearish => at.bearish_fvg = true,
                }
                at.fvg_top = Some(gap.top);
                at.fvg_bottom = Some(gap.bottom);

                if let Some(ob) = order_block {
                    match gap.direction {
                        Direction::Bullish => annotations[ob].bullish_ob = true,
                        Direction::Bearish => annotations[ob].bearish_ob = true,
                    }
                }
            }
        }
    }

    annotations
}
