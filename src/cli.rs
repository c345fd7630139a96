//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::alert_dispatcher::{AlertDispatcher, RetryPolicy};
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_alert_adapter::LogAlertAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, DEFAULT_WARMUP_DAYS};
use crate::domain::config_validation::{
    alert_transport, initial_status, parse_date, parse_variants, strategy_variants,
    validate_alerts_config, validate_backtest_config, validate_detector_config,
    validate_lifecycle_config, validate_live_config, validate_strategy_config,
};
use crate::domain::error::SmcError;
use crate::domain::lifecycle::LifecycleConfig;
use crate::domain::live::LiveConfig;
use crate::domain::metrics::{BacktestMetrics, TickerResult};
use crate::domain::patterns::{DetectorConfig, DEFAULT_EMA_PERIOD, DEFAULT_SWING_WINDOW};
use crate::domain::signal::SignalConfig;
use crate::domain::ticker_data::{build_unified_timeline, normalize_bars, TickerData};
use crate::domain::trade::Trade;
use crate::ports::alert_port::AlertPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::quote_port::QuotePort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "smctrader",
    about = "Smart Money Concepts setup scanner, backtester and trade tracker"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay historical bars and report the resulting trades
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Backtest a single ticker instead of the configured list
        #[arg(long)]
        ticker: Option<String>,
        /// Write per-trade records as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override `[strategy] variant` (trend, gap_fill or a comma list)
        #[arg(long)]
        variant: Option<String>,
    },
    /// Poll prices, manage stored trades and scan for new setups
    Live {
        #[arg(short, long)]
        config: PathBuf,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Re-drive stored active trades through finalized daily bars
    Audit {
        #[arg(short, long)]
        config: PathBuf,
        /// Last bar date to replay (defaults to today)
        #[arg(long)]
        through: Option<NaiveDate>,
    },
    /// Load a CSV of daily bars into the bar store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// List stored trades
    Trades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
        /// Only POTENTIAL, PENDING and OPEN trades
        #[arg(long)]
        active: bool,
    },
    /// Show stored data range for ticker(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            ticker,
            output,
            variant,
        } => run_backtest(
            &config,
            ticker.as_deref(),
            output.as_ref(),
            variant.as_deref(),
        ),
        Command::Live { config, once } => run_live(&config, once),
        Command::Audit { config, through } => run_audit(&config, through),
        Command::Import {
            config,
            ticker,
            csv,
        } => run_import(&config, &ticker, &csv),
        Command::Trades {
            config,
            ticker,
            active,
        } => run_trades(&config, ticker.as_deref(), active),
        Command::Info { config, ticker } => run_info(&config, ticker.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: SmcError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn build_detector_config(config: &dyn ConfigPort) -> DetectorConfig {
    DetectorConfig {
        swing_window: config
            .get_int("detector", "swing_window", DEFAULT_SWING_WINDOW as i64)
            .max(1) as usize,
        ema_period: config
            .get_int("detector", "ema_period", DEFAULT_EMA_PERIOD as i64)
            .max(1) as usize,
    }
}

/// One signal config per selected variant. An explicit `reward_multiple`
/// applies to every variant; otherwise each keeps its own default.
pub fn build_signal_configs(
    config: &dyn ConfigPort,
    variant_override: Option<&str>,
) -> Result<Vec<SignalConfig>, SmcError> {
    let variants = match variant_override {
        Some(raw) => parse_variants(raw)?,
        None => strategy_variants(config)?,
    };
    let require_order_block = config.get_bool("strategy", "require_order_block", false);
    let explicit_r = config
        .get_string("strategy", "reward_multiple")
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|r| r.is_finite() && *r > 0.0);

    Ok(variants
        .into_iter()
        .map(|variant| SignalConfig {
            variant,
            reward_multiple: explicit_r.unwrap_or_else(|| variant.default_reward_multiple()),
            require_order_block,
        })
        .collect())
}

pub fn build_lifecycle_config(config: &dyn ConfigPort) -> Result<LifecycleConfig, SmcError> {
    Ok(LifecycleConfig {
        initial_status: initial_status(config)?,
        single_active_per_ticker: config.get_bool("lifecycle", "single_active_per_ticker", false),
    })
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    variant_override: Option<&str>,
) -> Result<BacktestConfig, SmcError> {
    let start_date = parse_date(
        "backtest",
        "start_date",
        config.get_string("backtest", "start_date").as_deref(),
    )?;
    let end_date = parse_date(
        "backtest",
        "end_date",
        config.get_string("backtest", "end_date").as_deref(),
    )?;

    Ok(BacktestConfig {
        start_date,
        end_date,
        warmup_days: config.get_int("backtest", "warmup_days", DEFAULT_WARMUP_DAYS),
        detector: build_detector_config(config),
        signals: build_signal_configs(config, variant_override)?,
        lifecycle: build_lifecycle_config(config)?,
        commission_pct: config.get_double("backtest", "commission_pct", 0.0),
    })
}

pub fn build_live_config(config: &dyn ConfigPort) -> Result<LiveConfig, SmcError> {
    let defaults = LiveConfig::default();
    Ok(LiveConfig {
        workers: config.get_int("live", "workers", defaults.workers as i64).max(1) as usize,
        lookback: config.get_int("live", "lookback", defaults.lookback as i64).max(1) as usize,
        history_days: config.get_int("live", "history_days", defaults.history_days),
        poll_interval: Duration::from_secs(
            config
                .get_int(
                    "live",
                    "poll_interval_secs",
                    defaults.poll_interval.as_secs() as i64,
                )
                .max(1) as u64,
        ),
        detector: build_detector_config(config),
        signals: build_signal_configs(config, None)?,
        lifecycle: build_lifecycle_config(config)?,
    })
}

/// Alert transport from `[alerts]`, wrapped in the retry policy.
pub fn build_alert_dispatcher(config: &dyn ConfigPort) -> Result<AlertDispatcher, SmcError> {
    let transport: Box<dyn AlertPort + Send + Sync> = match alert_transport(config)?.as_str() {
        #[cfg(feature = "telegram")]
        "telegram" => Box::new(
            crate::adapters::telegram_alert_adapter::TelegramAlertAdapter::from_config(config)?,
        ),
        #[cfg(not(feature = "telegram"))]
        "telegram" => {
            return Err(SmcError::invalid(
                "alerts",
                "transport",
                "telegram transport requires the telegram feature",
            ))
        }
        _ => Box::new(LogAlertAdapter),
    };
    Ok(AlertDispatcher::new(transport, RetryPolicy::from_config(config)))
}

pub fn resolve_tickers(
    ticker_override: Option<&str>,
    config: &dyn ConfigPort,
    section: &str,
) -> Vec<String> {
    if let Some(t) = ticker_override {
        return vec![t.trim().to_uppercase()];
    }
    let tickers = config.get_list(section, "tickers");
    if !tickers.is_empty() {
        return tickers;
    }
    config.get_list(section, "ticker")
}

/// Bars and snapshots come from `[data] csv_dir` when set, else the SQLite store.
pub fn open_market_data(
    config: &dyn ConfigPort,
) -> Result<(Box<dyn DataPort + Sync>, Box<dyn QuotePort + Sync>), SmcError> {
    if let Some(dir) = config.get_string("data", "csv_dir") {
        let dir = PathBuf::from(dir);
        return Ok((
            Box::new(CsvAdapter::new(dir.clone())),
            Box::new(CsvAdapter::new(dir)),
        ));
    }

    #[cfg(feature = "sqlite")]
    {
        let adapter = open_store(config)?;
        Ok((Box::new(adapter.clone()), Box::new(adapter)))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        Err(SmcError::missing("data", "csv_dir"))
    }
}

#[cfg(feature = "sqlite")]
fn open_store(
    config: &dyn ConfigPort,
) -> Result<crate::adapters::sqlite_adapter::SqliteAdapter, SmcError> {
    let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(adapter)
}

fn run_backtest(
    config_path: &PathBuf,
    ticker_override: Option<&str>,
    output_path: Option<&PathBuf>,
    variant_override: Option<&str>,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let tickers = resolve_tickers(ticker_override, &adapter, "backtest");
    if ticker_override.is_none() {
        if let Err(e) = validate_backtest_config(&adapter) {
            return fail(e);
        }
    } else if let Err(e) = validate_detector_config(&adapter)
        .and_then(|_| validate_strategy_config(&adapter))
        .and_then(|_| validate_lifecycle_config(&adapter))
    {
        return fail(e);
    }

    // Stage 2: Build BacktestConfig
    let bt_config = match build_backtest_config(&adapter, variant_override) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    if tickers.is_empty() {
        return fail(SmcError::missing("backtest", "tickers"));
    }

    // Stage 3: Data source
    let (data_port, _) = match open_market_data(&adapter) {
        Ok(ports) => ports,
        Err(e) => return fail(e),
    };

    run_backtest_pipeline(data_port.as_ref(), &bt_config, &tickers, output_path)
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    bt_config: &BacktestConfig,
    tickers: &[String],
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 4: Fetch bars (with warmup history) and annotate
    let history_start = bt_config.history_start();
    let mut ticker_data: Vec<TickerData> = Vec::with_capacity(tickers.len());

    for ticker in tickers {
        let bars = match data_port.fetch_bars(ticker, history_start, bt_config.end_date) {
            Ok(bars) => normalize_bars(bars),
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "skipping ticker");
                continue;
            }
        };
        if bars.is_empty() {
            warn!(ticker = %ticker, "no bars in range, skipping");
            continue;
        }
        ticker_data.push(TickerData::new(ticker.clone(), bars, &bt_config.detector));
    }

    if ticker_data.is_empty() {
        eprintln!("error: no tickers with data to backtest");
        return ExitCode::from(5);
    }

    // Stage 5: Build timeline and replay
    let timeline = build_unified_timeline(&ticker_data);
    let variants: Vec<String> = bt_config.signals.iter().map(|s| s.variant.to_string()).collect();

    eprintln!(
        "Running backtest: {} tickers, {} to {}, variants [{}]",
        ticker_data.len(),
        bt_config.start_date,
        bt_config.end_date,
        variants.join(", "),
    );

    let result = backtest_engine::run_backtest(&ticker_data, &timeline, bt_config);
    eprintln!("  Processed: {} dates", result.dates_processed);

    // Stage 6: Metrics and console summary
    let metrics = BacktestMetrics::compute(&result.trades, bt_config.commission_pct);
    let ticker_results = TickerResult::compute_per_ticker(&result.trades);

    eprintln!("\n=== Aggregate Results ===");
    eprintln!("Setups:           {}", result.setups_generated);
    eprintln!("Duplicates:       {}", result.duplicates_dropped);
    eprintln!("Trades:           {}", metrics.total_trades);
    eprintln!("Closed:           {} ({} won, {} lost)", metrics.closed, metrics.wins, metrics.losses);
    eprintln!("Voided:           {}", metrics.voided);
    eprintln!("Still open:       {}", metrics.still_open);
    eprintln!("Unfilled:         {}", metrics.unfilled);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Total PnL:        {:.2}", metrics.total_pnl);
    eprintln!("Avg R:            {:.2}", metrics.avg_r_multiple);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);

    if !ticker_results.is_empty() {
        eprintln!("\n=== Per-Ticker Summary ===");
        for tr in &ticker_results {
            eprintln!(
                "  {}:  {} trades, {} closed, {:.1}% win rate, {:+.2}",
                tr.ticker,
                tr.total_trades,
                tr.closed,
                tr.win_rate * 100.0,
                tr.total_pnl,
            );
        }
    }

    // Stage 7: Trade report
    if let Some(output) = output_path {
        if let Err(e) = CsvReportAdapter.write(&result, output) {
            return fail(e);
        }
        eprintln!("\nTrades written to: {}", output.display());
    }

    ExitCode::SUCCESS
}

fn run_live(config_path: &PathBuf, once: bool) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::domain::live::LiveDriver;

        eprintln!("Loading config from {}", config_path.display());
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        if let Err(e) = validate_live_config(&config) {
            return fail(e);
        }

        let live_config = match build_live_config(&config) {
            Ok(c) => c,
            Err(e) => return fail(e),
        };
        let tickers = resolve_tickers(None, &config, "live");
        let store = match open_store(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        let (data_port, quote_port) = match open_market_data(&config) {
            Ok(ports) => ports,
            Err(e) => return fail(e),
        };
        let alerts = match build_alert_dispatcher(&config) {
            Ok(a) => a,
            Err(e) => return fail(e),
        };

        let poll_interval = live_config.poll_interval;
        let driver = match LiveDriver::new(
            data_port.as_ref(),
            quote_port.as_ref(),
            &store,
            &alerts,
            live_config,
        ) {
            Ok(d) => d,
            Err(e) => return fail(e),
        };

        info!(tickers = tickers.len(), once, "live driver started");
        loop {
            let summary = driver.run_cycle(&tickers, today());
            if once {
                eprintln!(
                    "Cycle complete: {} setups, {} transitions, {} failed tickers",
                    summary.setups_created(),
                    summary.transitions(),
                    summary.failures.len()
                );
                return ExitCode::SUCCESS;
            }
            std::thread::sleep(poll_interval);
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, once);
        eprintln!("error: sqlite feature is required for live");
        ExitCode::from(1)
    }
}

fn run_audit(config_path: &PathBuf, through: Option<NaiveDate>) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::domain::audit::audit_active_trades;

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        let store = match open_store(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        let (data_port, _) = match open_market_data(&config) {
            Ok(ports) => ports,
            Err(e) => return fail(e),
        };

        match audit_active_trades(data_port.as_ref(), &store, through.unwrap_or_else(today)) {
            Ok(summary) => {
                for trade in &summary.updated {
                    println!("{}", format_trade(trade));
                }
                eprintln!(
                    "Audited {} active trades: {} updated, {} failed",
                    summary.examined,
                    summary.updated.len(),
                    summary.failures.len()
                );
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, through);
        eprintln!("error: sqlite feature is required for audit");
        ExitCode::from(1)
    }
}

fn run_import(config_path: &PathBuf, ticker: &str, csv_path: &PathBuf) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::read_bars_file;

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        let store = match open_store(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };

        let ticker = ticker.trim().to_uppercase();
        let bars = match read_bars_file(csv_path, &ticker) {
            Ok(b) => b,
            Err(e) => return fail(e),
        };
        match store.insert_bars(&bars) {
            Ok(inserted) => {
                eprintln!(
                    "{}: {} bars read, {} new, {} already stored",
                    ticker,
                    bars.len(),
                    inserted,
                    bars.len() - inserted
                );
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, ticker, csv_path);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

fn format_trade(t: &Trade) -> String {
    let opt_price = |p: Option<f64>| p.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into());
    let opt_date = |d: Option<NaiveDate>| d.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
    format!(
        "{:>5} {:<12} {} {} entry {:.2} stop {:.2} target {:.2} {:<9} {:<4} in {} out {} @ {} pnl {} {}",
        t.id.map(|i| i.to_string()).unwrap_or_default(),
        t.ticker,
        t.signal_date,
        t.direction,
        t.entry_price,
        t.stop_price,
        t.target_price,
        t.status,
        t.outcome.map(|o| o.to_string()).unwrap_or_else(|| "-".into()),
        opt_date(t.entry_date),
        opt_date(t.exit_date),
        opt_price(t.exit_price),
        opt_price(t.pnl),
        t.reason.as_deref().unwrap_or(""),
    )
}

fn run_trades(config_path: &PathBuf, ticker: Option<&str>, active_only: bool) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::ports::trade_store::TradeStore;

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        let store = match open_store(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };

        let ticker = ticker.map(|t| t.trim().to_uppercase());
        let trades = match (&ticker, active_only) {
            (Some(t), true) => store.active_trades(t),
            (Some(t), false) => store.trades_for(t),
            (None, true) => store
                .all_trades()
                .map(|ts| ts.into_iter().filter(Trade::is_active).collect()),
            (None, false) => store.all_trades(),
        };
        let trades = match trades {
            Ok(t) => t,
            Err(e) => return fail(e),
        };

        for trade in &trades {
            println!("{}", format_trade(trade));
        }
        eprintln!("{} trades", trades.len());
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, ticker, active_only);
        eprintln!("error: sqlite feature is required for trades");
        ExitCode::from(1)
    }
}

fn run_info(config_path: &PathBuf, ticker: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let (data_port, _) = match open_market_data(&config) {
        Ok(ports) => ports,
        Err(e) => return fail(e),
    };

    let tickers = match ticker {
        Some(t) => vec![t.trim().to_uppercase()],
        None => match data_port.list_tickers() {
            Ok(t) => t,
            Err(e) => return fail(e),
        },
    };

    for t in &tickers {
        match data_port.get_data_range(t) {
            Ok(Some((min_date, max_date, count))) => {
                println!("{}: {} bars, {} to {}", t, count, min_date, max_date);
            }
            Ok(None) => eprintln!("{}: no data found", t),
            Err(e) => eprintln!("error querying {}: {}", t, e),
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut checks: Vec<(&str, Result<(), SmcError>)> = vec![
        ("detector", validate_detector_config(&config)),
        ("strategy", validate_strategy_config(&config)),
        ("lifecycle", validate_lifecycle_config(&config)),
        ("alerts", validate_alerts_config(&config)),
    ];
    if config.get_string("backtest", "start_date").is_some() {
        checks.push(("backtest", validate_backtest_config(&config)));
    }
    if !resolve_tickers(None, &config, "live").is_empty() {
        checks.push(("live", validate_live_config(&config)));
    }

    for (section, result) in checks {
        match result {
            Ok(()) => eprintln!("  [{section}] ok"),
            Err(e) => return fail(e),
        }
    }

    if let Ok(signals) = build_signal_configs(&config, None) {
        for s in &signals {
            eprintln!(
                "  variant {} (R = {}, order block required: {})",
                s.variant, s.reward_multiple, s.require_order_block
            );
        }
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
