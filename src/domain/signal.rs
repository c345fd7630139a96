//! Setup generation from freshly confirmed bullish gaps.
//!
//! Two variants share the same trigger (a bullish fair-value gap confirmed at
//! bar `i`) and differ in filter and price levels:
//!
//! | variant | filter | entry | stop | default R |
//! |---|---|---|---|---|
//! | trend confirmation | `close[i] > EMA[i]` | `high[i-2]` | `low[i-2]` | 2.0 |
//! | pure gap fill | none | `low[i]` | `low[i-2]` | 1.5 |
//!
//! Setups whose risk is not positive are dropped.

use chrono::NaiveDate;

use crate::domain::ohlcv::Bar;
use crate::domain::patterns::{Annotation, Direction, GAP_LAG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyVariant {
    TrendConfirmation,
    PureGapFill,
}

impl StrategyVariant {
    pub fn default_reward_multiple(self) -> f64 {
        match self {
            StrategyVariant::TrendConfirmation => 2.0,
            StrategyVariant::PureGapFill => 1.5,
        }
    }
}

impl std::fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyVariant::TrendConfirmation => write!(f, "trend"),
            StrategyVariant::PureGapFill => write!(f, "gap_fill"),
        }
    }
}

impl std::str::FromStr for StrategyVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trend" | "trend_ob" => Ok(StrategyVariant::TrendConfirmation),
            "gap_fill" | "fvg" | "pure_fvg" => Ok(StrategyVariant::PureGapFill),
            other => Err(format!("unknown strategy variant '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub variant: StrategyVariant,
    pub reward_multiple: f64,
    /// Also require the `i-2` candle to be a bullish order block.
    pub require_order_block: bool,
}

impl SignalConfig {
    pub fn for_variant(variant: StrategyVariant) -> Self {
        SignalConfig {
            variant,
            reward_multiple: variant.default_reward_multiple(),
            require_order_block: false,
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig::for_variant(StrategyVariant::TrendConfirmation)
    }
}

/// A risk-defined trade idea, not yet materialized as a trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Setup {
    pub ticker: String,
    pub signal_date: NaiveDate,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub direction: Direction,
}

impl Setup {
    /// Distance from entry to stop, positive for a well-formed setup.
    pub fn risk(&self) -> f64 {
        match self.direction {
            Direction::Bullish => self.entry_price - self.stop_price,
            Direction::Bearish => self.stop_price - self.entry_price,
        }
    }
}

/// Build the setup implied by a bullish gap confirmed at `index`, if any.
pub fn generate_setup(
    ticker: &str,
    bars: &[Bar],
    annotations: &[Annotation],
    index: usize,
    config: &SignalConfig,
) -> Option<Setup> {
    if index < GAP_LAG || index >= bars.len() || index >= annotations.len() {
        return None;
    }
    if !annotations[index].bullish_fvg {
        return None;
    }

    let origin = index - GAP_LAG;
    if config.require_order_block && !annotations[origin].bullish_ob {
        return None;
    }

    let (entry_price, stop_price) = match config.variant {
        StrategyVariant::TrendConfirmation => {
            let ema = annotations[index].ema?;
            if !(bars[index].close > ema) {
                return None;
            }
            (bars[origin].high, bars[origin].low)
        }
        StrategyVariant::PureGapFill => (bars[index].low, bars[origin].low),
    };

    let risk = entry_price - stop_price;
    if !(risk > 0.0) {
        return None;
    }

    Some(Setup {
        ticker: ticker.to_string(),
        signal_date: bars[index].date,
        entry_price,
        stop_price,
        target_price: entry_price + config.reward_multiple * risk,
        direction: Direction::Bullish,
    })
}

/// Every setup the sequence produces, in confirmation order.
pub fn scan_setups(
    ticker: &str,
    bars: &[Bar],
    annotations: &[Annotation],
    config: &SignalConfig,
) -> Vec<Setup> {
    (GAP_LAG..bars.len())
        .filter_map(|i| generate_setup(ticker, bars, annotations, i, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::patterns::{annotate, DetectorConfig};
    use approx::assert_relative_eq;

    fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            ticker: "TATASTEEL".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    fn gap_bars() -> Vec<Bar> {
        vec![
            bar(0, 99.0, 100.0, 98.0, 99.5),
            bar(1, 100.8, 101.0, 99.0, 99.2),
            bar(2, 100.5, 102.0, 100.0, 101.8),
            bar(3, 103.5, 105.0, 103.0, 104.5),
        ]
    }

    fn detector() -> DetectorConfig {
        DetectorConfig {
            swing_window: 5,
            ema_period: 2,
        }
    }

    #[test]
    fn pure_gap_fill_levels() {
        let bars = gap_bars();
        let ann = annotate(&bars, &detector());
        let config = SignalConfig::for_variant(StrategyVariant::PureGapFill);

        let setup = generate_setup("TATASTEEL", &bars, &ann, 3, &config).unwrap();
        assert_relative_eq!(setup.entry_price, 103.0);
        assert_relative_eq!(setup.stop_price, 99.0);
        assert_relative_eq!(setup.target_price, 109.0);
        assert_eq!(setup.signal_date, bars[3].date);
        assert_eq!(setup.direction, Direction::Bullish);
    }

    #[test]
    fn trend_variant_uses_order_block_range() {
        let bars = gap_bars();
        let ann = annotate(&bars, &detector());
        let setup = generate_setup("TATASTEEL", &bars, &ann, 3, &SignalConfig::default()).unwrap();

        assert_relative_eq!(setup.entry_price, 101.0);
        assert_relative_eq!(setup.stop_price, 99.0);
        assert_relative_eq!(setup.target_price, 105.0);
    }

    #[test]
    fn trend_variant_rejects_close_below_ema() {
        let bars = gap_bars();
        let mut ann = annotate(&bars, &detector());
        ann[3].ema = Some(200.0);
        assert!(generate_setup("TATASTEEL", &bars, &ann, 3, &SignalConfig::default()).is_none());
    }

    #[test]
    fn trend_variant_needs_ema_value() {
        let bars = gap_bars();
        let ann = annotate(
            &bars,
            &DetectorConfig {
                swing_window: 5,
                ema_period: 200,
            },
        );
        assert!(generate_setup("TATASTEEL", &bars, &ann, 3, &SignalConfig::default()).is_none());
    }

    #[test]
    fn non_positive_risk_is_discarded() {
        // Gap-fill entry is low[i]; equal to low[i-2] means zero risk.
        let bars = vec![
            bar(0, 99.0, 99.5, 99.0, 99.2),
            bar(1, 100.0, 101.0, 99.6, 100.8),
            bar(2, 99.5, 100.0, 99.0, 99.8),
        ];
        let mut ann = annotate(&bars, &detector());
        ann[2].bullish_fvg = true;
        let config = SignalConfig::for_variant(StrategyVariant::PureGapFill);
        assert!(generate_setup("X", &bars, &ann, 2, &config).is_none());
    }

    #[test]
    fn no_gap_no_setup() {
        let bars = gap_bars();
        let ann = annotate(&bars, &detector());
        assert!(generate_setup("TATASTEEL", &bars, &ann, 2, &SignalConfig::default()).is_none());
        assert!(generate_setup("TATASTEEL", &bars, &ann, 1, &SignalConfig::default()).is_none());
        assert!(generate_setup("TATASTEEL", &bars, &ann, 9, &SignalConfig::default()).is_none());
    }

    #[test]
    fn order_block_requirement() {
        let mut bars = gap_bars();
        bars[1].close = 100.9;
        let ann = annotate(&bars, &detector());
        let mut config = SignalConfig::for_variant(StrategyVariant::PureGapFill);

        assert!(generate_setup("TATASTEEL", &bars, &ann, 3, &config).is_some());
        config.require_order_block = true;
        assert!(generate_setup("TATASTEEL", &bars, &ann, 3, &config).is_none());
    }

    #[test]
    fn generation_is_idempotent() {
        let bars = gap_bars();
        let ann = annotate(&bars, &detector());
        let config = SignalConfig::for_variant(StrategyVariant::PureGapFill);
        let first = scan_setups("TATASTEEL", &bars, &ann, &config);
        let second = scan_setups("TATASTEEL", &bars, &ann, &config);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn custom_reward_multiple() {
        let bars = gap_bars();
        let ann = annotate(&bars, &detector());
        let config = SignalConfig {
            reward_multiple: 3.0,
            ..SignalConfig::for_variant(StrategyVariant::PureGapFill)
        };
        let setup = generate_setup("TATASTEEL", &bars, &ann, 3, &config).unwrap();
        assert_relative_eq!(setup.target_price, 115.0);
    }

    #[test]
    fn bearish_setup_risk() {
        let setup = Setup {
            ticker: "X".into(),
            signal_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            entry_price: 100.0,
            stop_price: 104.0,
            target_price: 92.0,
            direction: Direction::Bearish,
        };
        assert_relative_eq!(setup.risk(), 4.0);
    }

    #[test]
    fn variant_parsing() {
        assert_eq!("trend".parse::<StrategyVariant>(), Ok(StrategyVariant::TrendConfirmation));
        assert_eq!("GAP_FILL".parse::<StrategyVariant>(), Ok(StrategyVariant::PureGapFill));
        assert!("momentum".parse::<StrategyVariant>().is_err());
    }
}
