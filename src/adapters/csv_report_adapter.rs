//! Per-trade CSV report for a backtest run.

use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SmcError;
use crate::ports::report_port::ReportPort;

const HEADER: [&str; 15] = [
    "id",
    "ticker",
    "signal_date",
    "direction",
    "entry_price",
    "stop_price",
    "target_price",
    "status",
    "outcome",
    "entry_date",
    "exit_date",
    "exit_price",
    "pnl",
    "r_multiple",
    "reason",
];

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn price(value: f64) -> String {
    format!("{value:.4}")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), SmcError> {
        let csv_err = |e: csv::Error| SmcError::Io(std::io::Error::other(e));
        let mut writer = csv::Writer::from_path(output_path).map_err(csv_err)?;
        writer.write_record(HEADER).map_err(csv_err)?;

        for t in &result.trades {
            writer
                .write_record([
                    opt(t.id),
                    t.ticker.clone(),
                    t.signal_date.to_string(),
                    t.direction.to_string(),
                    price(t.entry_price),
                    price(t.stop_price),
                    price(t.target_price),
                    t.status.to_string(),
                    opt(t.outcome),
                    opt(t.entry_date),
                    opt(t.exit_date),
                    opt(t.exit_price.map(price)),
                    opt(t.pnl.map(price)),
                    opt(t.r_multiple().map(|r| format!("{r:.2}"))),
                    t.reason.clone().unwrap_or_default(),
                ])
                .map_err(csv_err)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::patterns::Direction;
    use crate::domain::trade::{Trade, TradeOutcome, TradeStatus};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn closed_trade() -> Trade {
        Trade {
            id: Some(7),
            ticker: "MARUTI".into(),
            signal_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            direction: Direction::Bullish,
            entry_price: 100.0,
            stop_price: 95.0,
            target_price: 110.0,
            status: TradeStatus::Closed,
            outcome: Some(TradeOutcome::Loss),
            entry_date: NaiveDate::from_ymd_opt(2024, 8, 2),
            exit_date: NaiveDate::from_ymd_opt(2024, 8, 5),
            exit_price: Some(95.0),
            pnl: Some(-5.0),
            reason: Some("stop hit".into()),
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");
        let result = BacktestResult {
            trades: vec![closed_trade()],
            ..BacktestResult::default()
        };

        CsvReportAdapter.write(&result, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,ticker,signal_date"));
        assert_eq!(
            lines[1],
            "7,MARUTI,2024-08-01,BULL,100.0000,95.0000,110.0000,CLOSED,LOSS,2024-08-02,2024-08-05,95.0000,-5.0000,-1.00,stop hit"
        );
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let result = BacktestResult::default();
        let err = CsvReportAdapter
            .write(&result, Path::new("/nonexistent/dir/trades.csv"))
            .unwrap_err();
        assert!(matches!(err, SmcError::Io(_)));
    }
}
