#![allow(dead_code)]

use chrono::NaiveDate;
use smctrader::domain::error::SmcError;
pub use smctrader::domain::observation::PriceObservation;
pub use smctrader::domain::ohlcv::Bar;
use smctrader::ports::alert_port::AlertPort;
use smctrader::ports::data_port::DataPort;
use smctrader::ports::quote_port::QuotePort;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, SmcError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(SmcError::Fetch {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_tickers(&self) -> Result<Vec<String>, SmcError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SmcError> {
        match self.data.get(ticker) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

/// Snapshot source whose next answer the test sets explicitly. Tickers
/// never set have no snapshot; tickers marked with `fail` return an error.
#[derive(Default)]
pub struct MockQuotePort {
    quotes: Mutex<HashMap<String, PriceObservation>>,
    errors: Mutex<HashMap<String, String>>,
}

impl MockQuotePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ticker: &str, obs: PriceObservation) {
        self.quotes.lock().unwrap().insert(ticker.to_string(), obs);
    }

    pub fn fail(&self, ticker: &str, reason: &str) {
        self.errors
            .lock()
            .unwrap()
            .insert(ticker.to_string(), reason.to_string());
    }
}

impl QuotePort for MockQuotePort {
    fn snapshot(&self, ticker: &str) -> Result<Option<PriceObservation>, SmcError> {
        if let Some(reason) = self.errors.lock().unwrap().get(ticker) {
            return Err(SmcError::Fetch {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.quotes.lock().unwrap().get(ticker).copied())
    }
}

/// Collects every alert message in send order.
#[derive(Default)]
pub struct RecordingAlerts {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl AlertPort for RecordingAlerts {
    fn send(&self, message: &str) -> Result<(), SmcError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

pub fn day(i: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 1).unwrap() + chrono::Duration::days(i)
}

pub fn make_bar(ticker: &str, i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        ticker: ticker.to_string(),
        date: day(i),
        open,
        high,
        low,
        close,
        volume: 1000,
    }
}

/// Four bars ending in a bullish gap confirmed on day 3. Pure gap fill gives
/// entry 103, stop 99, target 109; the day 1 candle is a bullish order block.
pub fn gap_bars(ticker: &str) -> Vec<Bar> {
    vec![
        make_bar(ticker, 0, 99.0, 100.0, 98.0, 99.5),
        make_bar(ticker, 1, 100.8, 101.0, 99.0, 99.2),
        make_bar(ticker, 2, 100.5, 104.0, 100.0, 101.8),
        make_bar(ticker, 3, 103.5, 105.0, 103.0, 104.5),
    ]
}

/// `gap_bars` followed by a bar that stays above the entry, one that fills
/// and one that runs to the target.
pub fn winning_path(ticker: &str) -> Vec<Bar> {
    let mut bars = gap_bars(ticker);
    bars.push(make_bar(ticker, 4, 104.0, 105.5, 104.0, 105.0));
    bars.push(make_bar(ticker, 5, 104.5, 105.0, 102.5, 104.0));
    bars.push(make_bar(ticker, 6, 104.0, 109.5, 103.8, 109.0));
    bars
}

/// `gap_bars` followed by a bar that fills and a bar that hits the stop.
pub fn losing_path(ticker: &str) -> Vec<Bar> {
    let mut bars = gap_bars(ticker);
    bars.push(make_bar(ticker, 4, 104.0, 104.5, 102.8, 103.5));
    bars.push(make_bar(ticker, 5, 103.0, 103.2, 98.5, 99.0));
    bars
}

pub fn csv_rows(bars: &[Bar]) -> String {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    out
}
