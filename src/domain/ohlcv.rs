//! Daily OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    /// close < open
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// close > open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar(open: f64, close: f64) -> Bar {
        Bar {
            ticker: "TATASTEEL".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 50_000,
        }
    }

    #[test]
    fn down_candle_is_bearish() {
        let bar = sample_bar(101.0, 99.0);
        assert!(bar.is_bearish());
        assert!(!bar.is_bullish());
    }

    #[test]
    fn up_candle_is_bullish() {
        let bar = sample_bar(99.0, 101.0);
        assert!(bar.is_bullish());
        assert!(!bar.is_bearish());
    }

    #[test]
    fn doji_is_neither() {
        let bar = sample_bar(100.0, 100.0);
        assert!(!bar.is_bullish());
        assert!(!bar.is_bearish());
    }
}
