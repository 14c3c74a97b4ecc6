use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Higher timeframes the engine aggregates one-minute candles into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    FifteenMin,
    ThirtyMin,
    FourHour,
}

impl Timeframe {
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::FifteenMin => 15,
            Timeframe::ThirtyMin => 30,
            Timeframe::FourHour => 240,
        }
    }

    pub fn to_seconds(&self) -> i64 {
        self.to_minutes() * 60
    }

    /// Returns true if `ts` (unix seconds) is exactly the start of one of
    /// this timeframe's periods.
    pub fn is_period_start(&self, ts: i64) -> bool {
        ts % self.to_seconds() == 0
    }

    /// Rounds `ts` (unix seconds) down to the start of the period it falls in.
    pub fn period_start(&self, ts: i64) -> i64 {
        let period = self.to_seconds();
        ts - ts.rem_euclid(period)
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1m" | "1min" | "onemin" => Ok(Timeframe::OneMin),
            "15m" | "15min" | "fifteenmin" => Ok(Timeframe::FifteenMin),
            "30m" | "30min" | "thirtymin" => Ok(Timeframe::ThirtyMin),
            "4h" | "4hour" | "fourhour" => Ok(Timeframe::FourHour),
            _ => Err(anyhow!(
                "invalid timeframe '{}'. valid options: 1m, 15m, 30m, 4h",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::OneMin => "1m",
            Timeframe::FifteenMin => "15m",
            Timeframe::ThirtyMin => "30m",
            Timeframe::FourHour => "4h",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_minutes_matches_variant() {
        assert_eq!(Timeframe::OneMin.to_minutes(), 1);
        assert_eq!(Timeframe::FifteenMin.to_minutes(), 15);
        assert_eq!(Timeframe::ThirtyMin.to_minutes(), 30);
        assert_eq!(Timeframe::FourHour.to_minutes(), 240);
    }

    #[test]
    fn from_str_accepts_common_spellings() {
        assert_eq!(Timeframe::from_str("1m").unwrap(), Timeframe::OneMin);
        assert_eq!(Timeframe::from_str("15Min").unwrap(), Timeframe::FifteenMin);
        assert_eq!(Timeframe::from_str("4h").unwrap(), Timeframe::FourHour);
        assert!(Timeframe::from_str("bogus").is_err());
    }

    #[test]
    fn period_start_rounds_down_to_boundary() {
        let tf = Timeframe::FifteenMin;
        let base = 1_704_067_200i64; // 2024-01-01T00:00:00Z, a 15m boundary
        assert_eq!(tf.period_start(base), base);
        assert_eq!(tf.period_start(base + 3 * 60), base);
        assert_eq!(tf.period_start(base + 15 * 60), base + 15 * 60);
        assert_eq!(tf.period_start(base + 17 * 60), base + 15 * 60);
    }

    #[test]
    fn is_period_start_agrees_with_period_start() {
        let tf = Timeframe::FourHour;
        let base = 1_704_067_200i64;
        assert!(tf.is_period_start(base));
        assert!(!tf.is_period_start(base + 60));
        assert!(tf.is_period_start(base + 4 * 3600));
    }
}
