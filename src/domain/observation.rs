//! A single price observation fed to the trade state machine.
//!
//! Historical replay builds one from each finalized bar; the live driver
//! builds one from a best-effort `{low, high, last}` snapshot. Prices that
//! are missing, non-finite or non-positive are treated as absent, never as
//! zero.

use chrono::NaiveDate;

use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub last: Option<f64>,
}

fn usable(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

impl PriceObservation {
    pub fn from_bar(bar: &Bar) -> Self {
        PriceObservation {
            date: bar.date,
            open: usable(Some(bar.open)),
            high: usable(Some(bar.high)),
            low: usable(Some(bar.low)),
            last: usable(Some(bar.close)),
        }
    }

    pub fn snapshot(
        date: NaiveDate,
        low: Option<f64>,
        high: Option<f64>,
        last: Option<f64>,
    ) -> Self {
        PriceObservation {
            date,
            open: None,
            high: usable(high),
            low: usable(low),
            last: usable(last),
        }
    }

    /// Lowest and highest traded price known from this observation.
    pub fn range(&self) -> Option<(f64, f64)> {
        let prices = [self.open, self.high, self.low, self.last];
        let mut known = prices.iter().flatten().copied();
        let first = known.next()?;
        Some(known.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    /// Price at which a pre-session setup is validated: the open when known,
    /// else the last traded price.
    pub fn reference(&self) -> Option<f64> {
        self.open.or(self.last)
    }

    pub fn is_empty(&self) -> bool {
        self.range().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn bar_observation_has_full_range() {
        let bar = Bar {
            ticker: "TRENT".into(),
            date: d(),
            open: 100.0,
            high: 104.0,
            low: 97.0,
            close: 103.0,
            volume: 10,
        };
        let obs = PriceObservation::from_bar(&bar);
        assert_eq!(obs.range(), Some((97.0, 104.0)));
        assert_eq!(obs.reference(), Some(100.0));
    }

    #[test]
    fn zero_and_nan_prices_are_absent() {
        let obs = PriceObservation::snapshot(d(), Some(0.0), Some(f64::NAN), None);
        assert!(obs.is_empty());
        assert!(obs.reference().is_none());
    }

    #[test]
    fn last_only_snapshot_is_a_point_range() {
        let obs = PriceObservation::snapshot(d(), None, None, Some(101.5));
        assert_eq!(obs.range(), Some((101.5, 101.5)));
        assert_eq!(obs.reference(), Some(101.5));
    }

    #[test]
    fn last_widens_stale_range() {
        let obs = PriceObservation::snapshot(d(), Some(100.0), Some(102.0), Some(99.0));
        assert_eq!(obs.range(), Some((99.0, 102.0)));
    }
}
