use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// The engine's two signal strategies (§4.5). A deployment may enable either
/// or both per `STRATEGIES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Malaysian,
    MovingAverage,
}

impl FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "malaysian" => Ok(StrategyKind::Malaysian),
            "movingaverage" | "moving_average" => Ok(StrategyKind::MovingAverage),
            _ => anyhow::bail!(
                "invalid strategy '{}'. must be 'Malaysian' or 'MovingAverage'",
                s
            ),
        }
    }
}

/// Fixed offset from UTC used for scheduler triggers and user-facing dates.
/// Only a handful of zones are supported; add entries as deployments need
/// them rather than pulling in a full IANA tz database dependency the rest
/// of the stack doesn't otherwise need.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneOffset {
    pub name: &'static str,
    pub offset_seconds: i32,
}

impl TimezoneOffset {
    pub fn lookup(name: &str) -> Result<Self> {
        let table: &[(&str, i32)] = &[
            ("Africa/Harare", 2 * 3600),
            ("Africa/Johannesburg", 2 * 3600),
            ("UTC", 0),
        ];
        table
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(n, secs)| TimezoneOffset {
                name: n,
                offset_seconds: *secs,
            })
            .context(format!("unsupported TIMEZONE '{name}'"))
    }

    pub fn to_fixed_offset(&self) -> chrono::FixedOffset {
        chrono::FixedOffset::east_opt(self.offset_seconds).expect("valid fixed offset")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Broker connectivity
    pub broker_ws_url: String,
    pub broker_app_id: String,

    // Store
    pub database_url: String,

    // Scheduling
    pub timezone: String,
    pub symbols_to_tables: HashMap<String, String>,
    pub strategies: Vec<StrategyKind>,
    pub sleep_interval_seconds: u64,
    pub monitor_interval_seconds: u64,
    pub balance_interval_seconds: u64,

    // Strategy / risk constants (§6)
    pub pip_value: Decimal,
    pub risk_percentage: Decimal,
    pub reward_to_risk_ratio: Decimal,
    pub default_buffer_pips: Decimal,
    pub high_risk_ratio: Decimal,
    pub low_risk_ratio: Decimal,
    pub atr_period: usize,
    pub adx_threshold: Decimal,

    // Dispatcher adapter-layer constants (§4.8, §9 Open Question 1)
    pub dispatcher_tp_multiplier: Decimal,
    pub dispatcher_sl_offset: Decimal,
    pub default_multiplier: u32,

    // Ingestor / watcher tuning
    pub candle_retry_attempts: u32,
    pub candle_retry_delay_seconds: u64,
    pub watcher_poll_seconds: u64,
    pub watcher_reconcile_seconds: u64,

    // Observability
    pub observability_enabled: bool,
    pub observability_interval_seconds: u64,
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("failed to parse {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn decimal_env(key: &str, default: f64) -> Result<Decimal> {
    match env::var(key) {
        Ok(v) => Decimal::from_str(&v).with_context(|| format!("failed to parse {key} as decimal")),
        Err(_) => Ok(Decimal::from_f64(default).unwrap_or_default()),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let broker_ws_url = env_var_or(
            "BROKER_WS_URL",
            "wss://broker.example/websockets/v3?app_id=1089",
        );
        let broker_app_id = env_var_or("BROKER_APP_ID", "1089");
        let database_url = env_var_or("DATABASE_URL", "sqlite://./data/engine.db");

        let timezone = env_var_or("TIMEZONE", "Africa/Harare");
        TimezoneOffset::lookup(&timezone).context("invalid TIMEZONE")?;

        let symbols_to_tables = match env::var("SYMBOLS_TO_TABLES") {
            Ok(raw) => parse_symbol_map(&raw).context("failed to parse SYMBOLS_TO_TABLES")?,
            Err(_) => default_symbol_map(),
        };

        let strategies = match env::var("STRATEGIES") {
            Ok(raw) => raw
                .split(',')
                .map(|s| StrategyKind::from_str(s.trim()))
                .collect::<Result<Vec<_>>>()
                .context("failed to parse STRATEGIES")?,
            Err(_) => vec![StrategyKind::Malaysian, StrategyKind::MovingAverage],
        };

        Ok(Self {
            broker_ws_url,
            broker_app_id,
            database_url,
            timezone,
            symbols_to_tables,
            strategies,
            sleep_interval_seconds: parse_env("SLEEP_INTERVAL_SECONDS", 14_400u64)?,
            monitor_interval_seconds: parse_env("MONITOR_INTERVAL_SECONDS", 300u64)?,
            balance_interval_seconds: parse_env("BALANCE_INTERVAL_SECONDS", 7_200u64)?,

            pip_value: decimal_env("PIP_VALUE", 0.0001)?,
            risk_percentage: decimal_env("RISK_PERCENTAGE", 0.01)?,
            reward_to_risk_ratio: decimal_env("REWARD_TO_RISK_RATIO", 2.0)?,
            default_buffer_pips: decimal_env("DEFAULT_BUFFER_PIPS", 20.0)?,
            high_risk_ratio: decimal_env("HIGH_RISK_RATIO", 2.0)?,
            low_risk_ratio: decimal_env("LOW_RISK_RATIO", 1.5)?,
            atr_period: parse_env("ATR_PERIOD", 14usize)?,
            adx_threshold: decimal_env("ADX_THRESHOLD", 20.0)?,

            dispatcher_tp_multiplier: decimal_env("DISPATCHER_TP_MULTIPLIER", 3.0)?,
            dispatcher_sl_offset: decimal_env("DISPATCHER_SL_OFFSET", 2.49)?,
            default_multiplier: parse_env("DEFAULT_MULTIPLIER", 30u32)?,

            candle_retry_attempts: parse_env("CANDLE_RETRY_ATTEMPTS", 3u32)?,
            candle_retry_delay_seconds: parse_env("CANDLE_RETRY_DELAY_SECONDS", 5u64)?,
            watcher_poll_seconds: parse_env("WATCHER_POLL_SECONDS", 2u64)?,
            watcher_reconcile_seconds: parse_env("WATCHER_RECONCILE_SECONDS", 10u64)?,

            observability_enabled: parse_env("OBSERVABILITY_ENABLED", true)?,
            observability_interval_seconds: parse_env("OBSERVABILITY_INTERVAL_SECONDS", 60u64)?,
        })
    }

    pub fn timezone_offset(&self) -> chrono::FixedOffset {
        TimezoneOffset::lookup(&self.timezone)
            .expect("validated in from_env")
            .to_fixed_offset()
    }
}

fn default_symbol_map() -> HashMap<String, String> {
    [
        ("frxEURUSD", "candles_eurusd"),
        ("frxGBPUSD", "candles_gbpusd"),
        ("frxUSDJPY", "candles_usdjpy"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn parse_symbol_map(raw: &str) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (symbol, table) = pair
            .split_once('=')
            .context("expected SYMBOL=table entries separated by commas")?;
        map.insert(symbol.trim().to_string(), table.trim().to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbol_map_pairs() {
        let map = parse_symbol_map("frxEURUSD=candles_eurusd, frxGBPUSD=candles_gbpusd").unwrap();
        assert_eq!(map.get("frxEURUSD").unwrap(), "candles_eurusd");
        assert_eq!(map.get("frxGBPUSD").unwrap(), "candles_gbpusd");
    }

    #[test]
    fn rejects_malformed_symbol_map_entry() {
        assert!(parse_symbol_map("frxEURUSD").is_err());
    }

    #[test]
    fn strategy_kind_parses_case_insensitively() {
        assert_eq!(
            StrategyKind::from_str("malaysian").unwrap(),
            StrategyKind::Malaysian
        );
        assert_eq!(
            StrategyKind::from_str("MovingAverage").unwrap(),
            StrategyKind::MovingAverage
        );
        assert!(StrategyKind::from_str("bogus").is_err());
    }

    #[test]
    fn timezone_lookup_resolves_default() {
        let tz = TimezoneOffset::lookup("Africa/Harare").unwrap();
        assert_eq!(tz.offset_seconds, 2 * 3600);
    }

    #[test]
    fn timezone_lookup_rejects_unknown_zone() {
        assert!(TimezoneOffset::lookup("Mars/Crater").is_err());
    }
}
