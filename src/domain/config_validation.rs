//! Configuration validation.
//!
//! Every command validates the sections it reads before doing any work, so
//! a typo surfaces as a config error instead of a silently applied default.

use crate::domain::error::SmcError;
use crate::domain::signal::StrategyVariant;
use crate::domain::trade::TradeStatus;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_detector_config(config: &dyn ConfigPort) -> Result<(), SmcError> {
    positive_int(config, "detector", "swing_window")?;
    positive_int(config, "detector", "ema_period")?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SmcError> {
    strategy_variants(config)?;
    if let Some(raw) = config.get_string("strategy", "reward_multiple") {
        match raw.parse::<f64>() {
            Ok(r) if r.is_finite() && r > 0.0 => {}
            _ => {
                return Err(SmcError::invalid(
                    "strategy",
                    "reward_multiple",
                    "reward_multiple must be a positive number",
                ))
            }
        }
    }
    boolean(config, "strategy", "require_order_block")?;
    Ok(())
}

pub fn validate_lifecycle_config(config: &dyn ConfigPort) -> Result<(), SmcError> {
    initial_status(config)?;
    boolean(config, "lifecycle", "single_active_per_ticker")?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SmcError> {
    validate_detector_config(config)?;
    validate_strategy_config(config)?;
    validate_lifecycle_config(config)?;
    validate_dates(config)?;
    validate_commission(config)?;
    if let Some(days) = int_value(config, "backtest", "warmup_days")? {
        if days < 0 {
            return Err(SmcError::invalid(
                "backtest",
                "warmup_days",
                "warmup_days must be non-negative",
            ));
        }
    }
    validate_tickers(config, "backtest")?;
    Ok(())
}

pub fn validate_live_config(config: &dyn ConfigPort) -> Result<(), SmcError> {
    validate_detector_config(config)?;
    validate_strategy_config(config)?;
    validate_lifecycle_config(config)?;
    validate_tickers(config, "live")?;
    for key in ["workers", "lookback", "poll_interval_secs", "history_days"] {
        positive_int(config, "live", key)?;
    }
    validate_alerts_config(config)?;
    Ok(())
}

pub fn validate_alerts_config(config: &dyn ConfigPort) -> Result<(), SmcError> {
    if alert_transport(config)? == "telegram" {
        for key in ["bot_token", "chat_id"] {
            if config.get_string("alerts", key).is_none() {
                return Err(SmcError::missing("alerts", key));
            }
        }
    }
    positive_int(config, "alerts", "max_attempts")?;
    if let Some(ms) = int_value(config, "alerts", "backoff_ms")? {
        if ms < 0 {
            return Err(SmcError::invalid(
                "alerts",
                "backoff_ms",
                "backoff_ms must be non-negative",
            ));
        }
    }
    Ok(())
}

/// `[strategy] variant` as a comma list; defaults to the trend variant.
pub fn strategy_variants(config: &dyn ConfigPort) -> Result<Vec<StrategyVariant>, SmcError> {
    match config.get_string("strategy", "variant") {
        Some(raw) => parse_variants(&raw),
        None => Ok(vec![StrategyVariant::TrendConfirmation]),
    }
}

/// Comma-separated variant names, deduplicated in first-seen order.
pub fn parse_variants(raw: &str) -> Result<Vec<StrategyVariant>, SmcError> {
    let mut variants = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let variant: StrategyVariant = name
            .parse()
            .map_err(|reason: String| SmcError::invalid("strategy", "variant", reason))?;
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    if variants.is_empty() {
        return Err(SmcError::invalid(
            "strategy",
            "variant",
            "at least one variant is required",
        ));
    }
    Ok(variants)
}

/// `[lifecycle] initial_status`: `potential` (default) or `pending`.
pub fn initial_status(config: &dyn ConfigPort) -> Result<TradeStatus, SmcError> {
    match config
        .get_string("lifecycle", "initial_status")
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        None | Some("potential") => Ok(TradeStatus::Potential),
        Some("pending") => Ok(TradeStatus::Pending),
        Some(other) => Err(SmcError::invalid(
            "lifecycle",
            "initial_status",
            format!("expected potential or pending, got '{other}'"),
        )),
    }
}

/// `[alerts] transport`: `log` (default) or `telegram`.
pub fn alert_transport(config: &dyn ConfigPort) -> Result<String, SmcError> {
    let transport = config
        .get_string("alerts", "transport")
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "log".to_string());
    match transport.as_str() {
        "log" | "telegram" => Ok(transport),
        other => Err(SmcError::invalid(
            "alerts",
            "transport",
            format!("expected log or telegram, got '{other}'"),
        )),
    }
}

pub fn parse_date(section: &str, field: &str, value: Option<&str>) -> Result<NaiveDate, SmcError> {
    match value {
        None => Err(SmcError::missing(section, field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            SmcError::invalid(
                section,
                field,
                format!("invalid {field} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SmcError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date("backtest", "start_date", start_str.as_deref())?;
    let end_date = parse_date("backtest", "end_date", end_str.as_deref())?;

    if start_date > end_date {
        return Err(SmcError::invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), SmcError> {
    if let Some(raw) = config.get_string("backtest", "commission_pct") {
        match raw.parse::<f64>() {
            Ok(pct) if pct.is_finite() && pct >= 0.0 => {}
            _ => {
                return Err(SmcError::invalid(
                    "backtest",
                    "commission_pct",
                    "commission_pct must be non-negative",
                ))
            }
        }
    }
    Ok(())
}

fn validate_tickers(config: &dyn ConfigPort, section: &str) -> Result<(), SmcError> {
    if config.get_list(section, "tickers").is_empty() && config.get_list(section, "ticker").is_empty()
    {
        return Err(SmcError::missing(section, "tickers"));
    }
    Ok(())
}

/// The key's integer value, `None` when absent, an error when not an integer.
fn int_value(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<i64>, SmcError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| SmcError::invalid(section, key, format!("{key} must be an integer"))),
    }
}

fn positive_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SmcError> {
    match int_value(config, section, key)? {
        Some(v) if v < 1 => Err(SmcError::invalid(
            section,
            key,
            format!("{key} must be at least 1"),
        )),
        _ => Ok(()),
    }
}

fn boolean(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SmcError> {
    // A value that parses neither way reads back as both defaults.
    if config.get_string(section, key).is_some()
        && config.get_bool(section, key, true) != config.get_bool(section, key, false)
    {
        return Err(SmcError::invalid(
            section,
            key,
            format!("{key} must be true or false"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const BACKTEST: &str = "[backtest]\ntickers = INFY,TCS\nstart_date = 2020-01-01\nend_date = 2024-12-31\n";

    fn backtest_with(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{BACKTEST}{extra}"))
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[detector]
swing_window = 5
ema_period = 200

[strategy]
variant = trend, gap_fill
reward_multiple = 2.5
require_order_block = no

[lifecycle]
initial_status = pending

[backtest]
tickers = INFY, TCS
start_date = 2020-01-01
end_date = 2024-12-31
commission_pct = 0.05
warmup_days = 300
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn single_ticker_key_accepted() {
        let config = make_config("[backtest]\nticker = INFY\nstart_date = 2020-01-01\nend_date = 2020-01-01\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn missing_tickers_fails() {
        let config = make_config("[backtest]\nstart_date = 2020-01-01\nend_date = 2024-12-31\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SmcError::ConfigMissing { key, .. } if key == "tickers"));
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config = make_config("[backtest]\nticker = INFY\nstart_date = 2020/01/01\nend_date = 2024-12-31\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn missing_end_date_fails() {
        let config = make_config("[backtest]\nticker = INFY\nstart_date = 2020-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SmcError::ConfigMissing { key, .. } if key == "end_date"));
    }

    #[test]
    fn start_date_after_end_date_fails() {
        let config = make_config("[backtest]\nticker = INFY\nstart_date = 2024-12-31\nend_date = 2020-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn negative_commission_fails() {
        let err = validate_backtest_config(&backtest_with("commission_pct = -0.1\n")).unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "commission_pct"));
    }

    #[test]
    fn zero_swing_window_fails() {
        let err =
            validate_backtest_config(&backtest_with("[detector]\nswing_window = 0\n")).unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "swing_window"));
    }

    #[test]
    fn non_numeric_ema_period_fails() {
        let err =
            validate_backtest_config(&backtest_with("[detector]\nema_period = long\n")).unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "ema_period"));
    }

    #[test]
    fn unknown_variant_fails() {
        let err =
            validate_backtest_config(&backtest_with("[strategy]\nvariant = momentum\n")).unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "variant"));
    }

    #[test]
    fn non_positive_reward_multiple_fails() {
        let err = validate_backtest_config(&backtest_with("[strategy]\nreward_multiple = 0\n"))
            .unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "reward_multiple"));
    }

    #[test]
    fn bad_boolean_fails() {
        let err = validate_backtest_config(&backtest_with("[strategy]\nrequire_order_block = maybe\n"))
            .unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "require_order_block"));
    }

    #[test]
    fn unknown_initial_status_fails() {
        let err = validate_backtest_config(&backtest_with("[lifecycle]\ninitial_status = open\n"))
            .unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "initial_status"));
    }

    #[test]
    fn variants_are_deduplicated_in_order() {
        let config = make_config("[strategy]\nvariant = gap_fill, trend, fvg\n");
        assert_eq!(
            strategy_variants(&config).unwrap(),
            vec![StrategyVariant::PureGapFill, StrategyVariant::TrendConfirmation]
        );
        assert_eq!(
            strategy_variants(&make_config("[strategy]\n")).unwrap(),
            vec![StrategyVariant::TrendConfirmation]
        );
    }

    #[test]
    fn valid_live_config_passes() {
        let config = make_config("[live]\ntickers = SBIN\nworkers = 2\nlookback = 3\n");
        assert!(validate_live_config(&config).is_ok());
    }

    #[test]
    fn zero_workers_fails() {
        let config = make_config("[live]\ntickers = SBIN\nworkers = 0\n");
        let err = validate_live_config(&config).unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "workers"));
    }

    #[test]
    fn telegram_requires_credentials() {
        let config = make_config("[live]\ntickers = SBIN\n[alerts]\ntransport = telegram\nbot_token = t\n");
        let err = validate_live_config(&config).unwrap_err();
        assert!(matches!(err, SmcError::ConfigMissing { key, .. } if key == "chat_id"));
    }

    #[test]
    fn unknown_transport_fails() {
        let config = make_config("[alerts]\ntransport = pigeon\n");
        let err = validate_alerts_config(&config).unwrap_err();
        assert!(matches!(err, SmcError::ConfigInvalid { key, .. } if key == "transport"));
    }
}
