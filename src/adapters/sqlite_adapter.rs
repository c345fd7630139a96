//! SQLite storage adapter: daily bars plus the trade table.
//!
//! The `trades` table carries a partial unique index over
//! `(ticker, signal_date)` restricted to active statuses, so a second active
//! trade for the same setup cannot be written even by a racing process.

use crate::domain::error::SmcError;
use crate::domain::lifecycle::admits;
use crate::domain::observation::PriceObservation;
use crate::domain::ohlcv::Bar;
use crate::domain::trade::Trade;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::quote_port::QuotePort;
use crate::ports::trade_store::TradeStore;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

const DATE_FMT: &str = "%Y-%m-%d";

const TRADE_COLUMNS: &str = "id, ticker, signal_date, direction, entry_price, stop_price, \
     target_price, status, outcome, entry_date, exit_date, exit_price, pnl, reason";

fn pool_err(e: r2d2::Error) -> SmcError {
    SmcError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> SmcError {
    SmcError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, DATE_FMT).map_err(|e| conversion_err(idx, e))
}

fn opt_date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| NaiveDate::parse_from_str(&s, DATE_FMT).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

#[derive(Debug)]
struct BadColumn(String);

impl std::fmt::Display for BadColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BadColumn {}

fn parsed_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_err(idx, BadColumn(e)))
}

fn bar_from_row(row: &Row<'_>) -> rusqlite::Result<Bar> {
    Ok(Bar {
        ticker: row.get(0)?,
        date: date_at(row, 1)?,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        volume: row.get(6)?,
    })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    let outcome: Option<String> = row.get(8)?;
    Ok(Trade {
        id: Some(row.get(0)?),
        ticker: row.get(1)?,
        signal_date: date_at(row, 2)?,
        direction: parsed_at(row, 3)?,
        entry_price: row.get(4)?,
        stop_price: row.get(5)?,
        target_price: row.get(6)?,
        status: parsed_at(row, 7)?,
        outcome: outcome
            .map(|s| s.parse().map_err(|e| conversion_err(8, BadColumn(e))))
            .transpose()?,
        entry_date: opt_date_at(row, 9)?,
        exit_date: opt_date_at(row, 10)?,
        exit_price: row.get(11)?,
        pnl: row.get(12)?,
        reason: row.get(13)?,
    })
}

#[derive(Clone)]
pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SmcError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| SmcError::missing("sqlite", "path"))?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, SmcError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SmcError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), SmcError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bars (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (ticker, date)
            );
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                signal_date TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price REAL NOT NULL,
                stop_price REAL NOT NULL,
                target_price REAL NOT NULL,
                status TEXT NOT NULL,
                outcome TEXT,
                entry_date TEXT,
                exit_date TEXT,
                exit_price REAL,
                pnl REAL,
                reason TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE UNIQUE INDEX IF NOT EXISTS uq_trades_active_setup
                ON trades(ticker, signal_date)
                WHERE status IN ('POTENTIAL', 'PENDING', 'OPEN');
            CREATE INDEX IF NOT EXISTS idx_trades_ticker_status ON trades(ticker, status);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    /// Append bars; rows already stored for a (ticker, date) are left as they
    /// are. Returns how many rows were new.
    pub fn insert_bars(&self, bars: &[Bar]) -> Result<usize, SmcError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO bars (ticker, date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_err)?;
            for bar in bars {
                inserted += stmt
                    .execute(params![
                        bar.ticker,
                        fmt_date(bar.date),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    ])
                    .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)?;
        Ok(inserted)
    }

    fn query_trades(
        &self,
        where_clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Trade>, SmcError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {TRADE_COLUMNS} FROM trades {where_clause} ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt.query_map(args, trade_from_row).map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, SmcError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT ticker, date, open, high, low, close, volume
                 FROM bars
                 WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![ticker, fmt_date(start_date), fmt_date(end_date)],
                bar_from_row,
            )
            .map_err(query_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn list_tickers(&self) -> Result<Vec<String>, SmcError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM bars ORDER BY ticker")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .map_err(query_err)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SmcError> {
        let conn = self.conn()?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM bars WHERE ticker = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let parse = |s: &str| {
                    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| SmcError::Database {
                        reason: e.to_string(),
                    })
                };
                Ok(Some((parse(&min_str)?, parse(&max_str)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

/// The most recent stored bar, read as a `{low, high, last}` snapshot.
impl QuotePort for SqliteAdapter {
    fn snapshot(&self, ticker: &str) -> Result<Option<PriceObservation>, SmcError> {
        let conn = self.conn()?;
        let bar = conn
            .query_row(
                "SELECT ticker, date, open, high, low, close, volume
                 FROM bars WHERE ticker = ?1 ORDER BY date DESC LIMIT 1",
                params![ticker],
                bar_from_row,
            )
            .optional()
            .map_err(query_err)?;
        Ok(bar.map(|b| PriceObservation::snapshot(b.date, Some(b.low), Some(b.high), Some(b.close))))
    }
}

impl TradeStore for SqliteAdapter {
    fn create_if_absent(
        &self,
        trade: &Trade,
        single_active_per_ticker: bool,
    ) -> Result<Option<Trade>, SmcError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;

        let existing = {
            let sql = format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 WHERE ticker = ?1 AND status IN ('POTENTIAL', 'PENDING', 'OPEN')"
            );
            let mut stmt = tx.prepare(&sql).map_err(query_err)?;
            let rows = stmt
                .query_map(params![trade.ticker], trade_from_row)
                .map_err(query_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)?
        };

        if !admits(&existing, trade, single_active_per_ticker) {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO trades (ticker, signal_date, direction, entry_price, stop_price,
                target_price, status, outcome, entry_date, exit_date, exit_price, pnl, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                trade.ticker,
                fmt_date(trade.signal_date),
                trade.direction.to_string(),
                trade.entry_price,
                trade.stop_price,
                trade.target_price,
                trade.status.as_str(),
                trade.outcome.map(|o| o.as_str()),
                trade.entry_date.map(fmt_date),
                trade.exit_date.map(fmt_date),
                trade.exit_price,
                trade.pnl,
                trade.reason,
            ],
        )
        .map_err(query_err)?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(query_err)?;

        let mut stored = trade.clone();
        stored.id = Some(id);
        Ok(Some(stored))
    }

    fn update(&self, trade: &Trade) -> Result<(), SmcError> {
        let id = trade.id.ok_or_else(|| SmcError::DatabaseQuery {
            reason: format!("trade {} {} has no id", trade.ticker, trade.signal_date),
        })?;
        let conn = self.conn()?;

        let changed = conn
            .execute(
                "UPDATE trades
                 SET status = ?2, outcome = ?3, entry_date = ?4, exit_date = ?5,
                     exit_price = ?6, pnl = ?7, reason = ?8, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?1 AND status IN ('POTENTIAL', 'PENDING', 'OPEN')",
                params![
                    id,
                    trade.status.as_str(),
                    trade.outcome.map(|o| o.as_str()),
                    trade.entry_date.map(fmt_date),
                    trade.exit_date.map(fmt_date),
                    trade.exit_price,
                    trade.pnl,
                    trade.reason,
                ],
            )
            .map_err(query_err)?;

        if changed == 0 {
            return Err(SmcError::DatabaseQuery {
                reason: format!("trade {id} is missing or already terminal"),
            });
        }
        Ok(())
    }

    fn active_trades(&self, ticker: &str) -> Result<Vec<Trade>, SmcError> {
        self.query_trades(
            "WHERE ticker = ?1 AND status IN ('POTENTIAL', 'PENDING', 'OPEN')",
            &[&ticker],
        )
    }

    fn trades_for(&self, ticker: &str) -> Result<Vec<Trade>, SmcError> {
        self.query_trades("WHERE ticker = ?1", &[&ticker])
    }

    fn all_trades(&self) -> Result<Vec<Trade>, SmcError> {
        self.query_trades("", &[])
    }
}
