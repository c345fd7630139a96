//! CSV file data adapter.
//!
//! One file per ticker, `<base_path>/<TICKER>.csv`, with the header
//! `date,open,high,low,close,volume` and ISO dates.

use crate::domain::error::SmcError;
use crate::domain::observation::PriceObservation;
use crate::domain::ohlcv::Bar;
use crate::domain::ticker_data::normalize_bars;
use crate::ports::data_port::DataPort;
use crate::ports::quote_port::QuotePort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, String> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| format!("missing {name} column"))
}

fn parse_price(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    field(record, idx, name)?
        .parse()
        .map_err(|e| format!("invalid {name} value: {e}"))
}

fn parse_volume(record: &csv::StringRecord) -> Result<i64, String> {
    let raw = field(record, 5, "volume")?;
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<i64>()
        .or_else(|_| raw.parse::<f64>().map(|v| v as i64))
        .map_err(|e| format!("invalid volume value: {e}"))
}

fn parse_record(ticker: &str, record: &csv::StringRecord) -> Result<Bar, String> {
    let date_str = field(record, 0, "date")?;
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{date_str}': {e}"))?;
    Ok(Bar {
        ticker: ticker.to_string(),
        date,
        open: parse_price(record, 1, "open")?,
        high: parse_price(record, 2, "high")?,
        low: parse_price(record, 3, "low")?,
        close: parse_price(record, 4, "close")?,
        volume: parse_volume(record)?,
    })
}

/// Read every bar in `path` for `ticker`, sorted with repeated dates collapsed.
pub fn read_bars_file(path: &Path, ticker: &str) -> Result<Vec<Bar>, SmcError> {
    let content = fs::read_to_string(path).map_err(|e| SmcError::Fetch {
        ticker: ticker.to_string(),
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| SmcError::Fetch {
            ticker: ticker.to_string(),
            reason: format!("CSV parse error: {e}"),
        })?;
        let bar = parse_record(ticker, &record).map_err(|reason| SmcError::Fetch {
            ticker: ticker.to_string(),
            reason: format!("{}:{}: {}", path.display(), line + 2, reason),
        })?;
        bars.push(bar);
    }
    Ok(normalize_bars(bars))
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, SmcError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Err(SmcError::NoData {
                ticker: ticker.to_string(),
            });
        }
        let mut bars = read_bars_file(&path, ticker)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_tickers(&self) -> Result<Vec<String>, SmcError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut tickers = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    tickers.push(stem.to_string());
                }
            }
        }

        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SmcError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Ok(None);
        }
        let bars = read_bars_file(&path, ticker)?;
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, bars.len()))),
            _ => Ok(None),
        }
    }
}

/// The newest row of the ticker's file, read as a `{low, high, last}` snapshot.
impl QuotePort for CsvAdapter {
    fn snapshot(&self, ticker: &str) -> Result<Option<PriceObservation>, SmcError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Ok(None);
        }
        let bars = read_bars_file(&path, ticker)?;
        Ok(bars
            .last()
            .map(|b| PriceObservation::snapshot(b.date, Some(b.low), Some(b.high), Some(b.close))))
    }
}
