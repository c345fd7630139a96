//! Live polling driver.
//!
//! One [`LiveDriver::run_cycle`] call is one poll: every ticker is processed
//! on a bounded rayon pool, a failing ticker is logged and skipped, and the
//! others carry on. Work on a single ticker is serialized by a per-ticker
//! lock, and new trades go through the store's atomic create-if-absent, so
//! overlapping cycles cannot create a second active trade for a setup.
//!
//! Per ticker, a cycle:
//! 1. advances the ticker's active trades with the latest `{low, high, last}`
//!    snapshot, persisting each transition before alerting on it;
//! 2. scans the newest `lookback` bars for freshly confirmed setups and
//!    creates a trade for each one not seen before.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::error::SmcError;
use crate::domain::lifecycle::{advance, materialize, ExitResolution, LifecycleConfig};
use crate::domain::patterns::{annotate, DetectorConfig};
use crate::domain::signal::{generate_setup, SignalConfig};
use crate::domain::ticker_data::normalize_bars;
use crate::domain::trade::TradeEvent;
use crate::ports::alert_port::AlertPort;
use crate::ports::data_port::DataPort;
use crate::ports::quote_port::QuotePort;
use crate::ports::trade_store::TradeStore;

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub workers: usize,
    /// How many of the newest bars are checked for setups each cycle.
    pub lookback: usize,
    /// Calendar days of bar history fetched for detection and the EMA.
    pub history_days: i64,
    pub poll_interval: Duration,
    pub detector: DetectorConfig,
    pub signals: Vec<SignalConfig>,
    pub lifecycle: LifecycleConfig,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            workers: 4,
            lookback: 1,
            history_days: 400,
            poll_interval: Duration::from_secs(300),
            detector: DetectorConfig::default(),
            signals: vec![SignalConfig::default()],
            lifecycle: LifecycleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerReport {
    pub ticker: String,
    pub setups_created: usize,
    /// Setups skipped because a trade already exists for that signal date.
    pub setups_known: usize,
    pub transitions: usize,
    pub failed_updates: usize,
}

#[derive(Debug)]
pub struct TickerFailure {
    pub ticker: String,
    pub error: SmcError,
}

#[derive(Debug, Default)]
pub struct CycleSummary {
    pub reports: Vec<TickerReport>,
    pub failures: Vec<TickerFailure>,
}

impl CycleSummary {
    pub fn setups_created(&self) -> usize {
        self.reports.iter().map(|r| r.setups_created).sum()
    }

    pub fn transitions(&self) -> usize {
        self.reports.iter().map(|r| r.transitions).sum()
    }
}

pub struct LiveDriver<'a> {
    data: &'a (dyn DataPort + Sync),
    quotes: &'a (dyn QuotePort + Sync),
    store: &'a (dyn TradeStore + Sync),
    alerts: &'a (dyn AlertPort + Sync),
    config: LiveConfig,
    pool: rayon::ThreadPool,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<'a> LiveDriver<'a> {
    pub fn new(
        data: &'a (dyn DataPort + Sync),
        quotes: &'a (dyn QuotePort + Sync),
        store: &'a (dyn TradeStore + Sync),
        alerts: &'a (dyn AlertPort + Sync),
        config: LiveConfig,
    ) -> Result<Self, SmcError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("smctrader-live-{i}"))
            .build()
            .map_err(|e| SmcError::invalid("live", "workers", e.to_string()))?;
        Ok(Self {
            data,
            quotes,
            store,
            alerts,
            config,
            pool,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Run one poll over `tickers`. Never fails as a whole.
    pub fn run_cycle(&self, tickers: &[String], today: NaiveDate) -> CycleSummary {
        let results: Vec<_> = self.pool.install(|| {
            tickers
                .par_iter()
                .map(|ticker| {
                    self.process_ticker(ticker, today)
                        .map_err(|error| TickerFailure {
                            ticker: ticker.clone(),
                            error,
                        })
                })
                .collect()
        });

        let mut summary = CycleSummary::default();
        for result in results {
            match result {
                Ok(report) => summary.reports.push(report),
                Err(failure) => {
                    warn!(ticker = %failure.ticker, error = %failure.error, "ticker skipped this cycle");
                    summary.failures.push(failure);
                }
            }
        }

        info!(
            tickers = tickers.len(),
            setups = summary.setups_created(),
            transitions = summary.transitions(),
            failures = summary.failures.len(),
            "live cycle complete"
        );
        summary
    }

    fn ticker_lock(&self, ticker: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(ticker.to_string()).or_default())
    }

    /// Process one ticker end to end while holding its lock.
    pub fn process_ticker(&self, ticker: &str, today: NaiveDate) -> Result<TickerReport, SmcError> {
        let lock = self.ticker_lock(ticker);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut report = TickerReport {
            ticker: ticker.to_string(),
            ..TickerReport::default()
        };
        self.manage_active(ticker, &mut report)?;
        self.scan_new_setups(ticker, today, &mut report)?;
        Ok(report)
    }

    fn manage_active(&self, ticker: &str, report: &mut TickerReport) -> Result<(), SmcError> {
        let active = self.store.active_trades(ticker)?;
        if active.is_empty() {
            return Ok(());
        }

        let Some(obs) = self.quotes.snapshot(ticker)? else {
            debug!(ticker, "no snapshot this poll");
            return Ok(());
        };

        for trade in &active {
            let step = advance(trade, &obs, ExitResolution::NextObservation);
            if step.trade == *trade {
                continue;
            }
            if let Err(e) = self.store.update(&step.trade) {
                warn!(ticker, id = ?trade.id, error = %e, "transition not persisted");
                report.failed_updates += 1;
                continue;
            }
            info!(
                ticker,
                id = ?trade.id,
                from = %trade.status,
                to = %step.trade.status,
                reason = step.trade.reason.as_deref().unwrap_or(""),
                "trade transition"
            );
            report.transitions += 1;
            for event in &step.events {
                self.notify(event);
            }
        }
        Ok(())
    }

    fn scan_new_setups(
        &self,
        ticker: &str,
        today: NaiveDate,
        report: &mut TickerReport,
    ) -> Result<(), SmcError> {
        let from = today - chrono::Duration::days(self.config.history_days.max(0));
        let bars = normalize_bars(self.data.fetch_bars(ticker, from, today)?);
        if bars.is_empty() {
            debug!(ticker, "no bars");
            return Ok(());
        }
        let annotations = annotate(&bars, &self.config.detector);

        let mut known: HashSet<NaiveDate> = self
            .store
            .trades_for(ticker)?
            .iter()
            .map(|t| t.signal_date)
            .collect();

        let start = bars.len().saturating_sub(self.config.lookback.max(1));
        for index in start..bars.len() {
            for signal in &self.config.signals {
                let Some(setup) = generate_setup(ticker, &bars, &annotations, index, signal) else {
                    continue;
                };
                if known.contains(&setup.signal_date) {
                    report.setups_known += 1;
                    continue;
                }
                let Some(trade) = materialize(&setup, self.config.lifecycle.initial_status) else {
                    continue;
                };
                match self
                    .store
                    .create_if_absent(&trade, self.config.lifecycle.single_active_per_ticker)?
                {
                    Some(stored) => {
                        info!(
                            ticker,
                            signal_date = %stored.signal_date,
                            entry = stored.entry_price,
                            stop = stored.stop_price,
                            target = stored.target_price,
                            "setup detected"
                        );
                        known.insert(stored.signal_date);
                        report.setups_created += 1;
                        self.notify(&TradeEvent::SetupDetected(stored));
                    }
                    None => {
                        debug!(ticker, signal_date = %setup.signal_date, "duplicate setup dropped");
                        known.insert(setup.signal_date);
                        report.setups_known += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn notify(&self, event: &TradeEvent) {
        if let Err(e) = self.alerts.send(&event.to_string()) {
            warn!(
                ticker = %event.trade().ticker,
                kind = event.kind(),
                error = %e,
                "alert not delivered"
            );
        }
    }
}
