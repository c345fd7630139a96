//! Per-ticker annotated bar history and the unified replay timeline.

use crate::domain::ohlcv::Bar;
use crate::domain::patterns::{annotate, Annotation, DetectorConfig};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct TickerData {
    pub ticker: String,
    pub bars: Vec<Bar>,
    pub annotations: Vec<Annotation>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl TickerData {
    /// Bars must already be in ascending date order.
    pub fn new(ticker: String, bars: Vec<Bar>, detector: &DetectorConfig) -> Self {
        let annotations = annotate(&bars, detector);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            ticker,
            bars,
            annotations,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }
}

/// Sort bars by date and drop repeated dates, keeping the last occurrence.
pub fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.date);
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(prev) if prev.date == bar.date => *prev = bar,
            _ => out.push(bar),
        }
    }
    out
}

pub fn build_unified_timeline(tickers: &[TickerData]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = tickers
        .iter()
        .flat_map(|td| td.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
