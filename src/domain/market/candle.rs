use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed one-minute OHLC bar for a single symbol.
///
/// `ts` is the minute boundary (unix seconds, `ts % 60 == 0`) covering
/// `[ts, ts+60)`. `(symbol, ts)` is the primary key in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub ts: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    /// `low <= min(open,close) <= max(open,close) <= high` and the
    /// timestamp falls on a minute boundary.
    pub fn is_valid(&self) -> bool {
        self.ts % 60 == 0
            && self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

/// A roll-up of consecutive minute candles into a higher timeframe bucket.
/// Derived on demand by the aggregator; never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCandle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub ts: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_candle_off_minute_boundary() {
        let c = Candle {
            symbol: "frxEURUSD".into(),
            ts: 61,
            open: dec!(1.1),
            high: dec!(1.1),
            low: dec!(1.1),
            close: dec!(1.1),
        };
        assert!(!c.is_valid());
    }

    #[test]
    fn rejects_candle_with_high_below_close() {
        let c = Candle {
            symbol: "frxEURUSD".into(),
            ts: 60,
            open: dec!(1.10),
            high: dec!(1.10),
            low: dec!(1.09),
            close: dec!(1.11),
        };
        assert!(!c.is_valid());
    }

    #[test]
    fn accepts_well_formed_candle() {
        let c = Candle {
            symbol: "frxEURUSD".into(),
            ts: 120,
            open: dec!(1.1000),
            high: dec!(1.1020),
            low: dec!(1.0990),
            close: dec!(1.1010),
        };
        assert!(c.is_valid());
    }
}
