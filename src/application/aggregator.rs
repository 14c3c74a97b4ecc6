//! Aggregator (C4): a pure roll-up of one-minute candles into a higher
//! timeframe. No I/O, no persisted intermediate state — every call over
//! the same input produces the same buckets, which is what lets the
//! orchestrator recompute `H`/`M15`/`M30` on demand every iteration.

use crate::domain::market::candle::{AggregatedCandle, Candle};
use crate::domain::market::timeframe::Timeframe;

/// Rolls up `minutes` (assumed to already belong to a single symbol) into
/// buckets of `timeframe`. Candles out of non-decreasing `ts` order are
/// skipped rather than breaking the running bucket. The last bucket is
/// emitted even if its period hasn't closed yet — callers treat it as
/// partial.
pub fn aggregate(minutes: &[Candle], timeframe: Timeframe) -> Vec<AggregatedCandle> {
    let mut out = Vec::new();
    let mut current: Option<AggregatedCandle> = None;
    let mut last_ts: Option<i64> = None;

    for c in minutes {
        if let Some(prev_ts) = last_ts {
            if c.ts < prev_ts {
                continue;
            }
        }
        last_ts = Some(c.ts);

        let bucket = timeframe.period_start(c.ts);
        match current.as_mut() {
            Some(running) if running.ts == bucket => {
                running.high = running.high.max(c.high);
                running.low = running.low.min(c.low);
                running.close = c.close;
            }
            _ => {
                if let Some(finished) = current.take() {
                    out.push(finished);
                }
                current = Some(AggregatedCandle {
                    symbol: c.symbol.clone(),
                    timeframe,
                    ts: bucket,
                    open: c.open,
                    high: c.high,
                    low: c.low,
                    close: c.close,
                });
            }
        }
    }
    if let Some(finished) = current.take() {
        out.push(finished);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn minute(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle {
            symbol: "frxEURUSD".into(),
            ts,
            open: rust_decimal::Decimal::try_from(o).unwrap(),
            high: rust_decimal::Decimal::try_from(h).unwrap(),
            low: rust_decimal::Decimal::try_from(l).unwrap(),
            close: rust_decimal::Decimal::try_from(c).unwrap(),
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(aggregate(&[], Timeframe::FifteenMin).is_empty());
    }

    #[test]
    fn groups_minutes_into_fifteen_minute_buckets() {
        let base = 1_704_067_200i64; // boundary
        let minutes = vec![
            minute(base, 1.10, 1.11, 1.09, 1.105),
            minute(base + 60, 1.105, 1.12, 1.10, 1.115),
            minute(base + 14 * 60, 1.115, 1.13, 1.11, 1.12),
            minute(base + 15 * 60, 1.12, 1.14, 1.12, 1.13),
        ];
        let out = aggregate(&minutes, Timeframe::FifteenMin);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].ts, base);
        assert_eq!(out[0].open, dec!(1.10));
        assert_eq!(out[0].close, dec!(1.12));
        assert_eq!(out[0].high, dec!(1.13));
        assert_eq!(out[0].low, dec!(1.09));
        assert_eq!(out[1].ts, base + 15 * 60);
        assert!(out[1].open == dec!(1.12) && out[1].close == dec!(1.13));
    }

    #[test]
    fn out_of_order_candle_is_skipped() {
        let base = 1_704_067_200i64;
        let minutes = vec![
            minute(base, 1.10, 1.11, 1.09, 1.10),
            minute(base - 60, 9.0, 9.0, 9.0, 9.0), // out of order, skipped
            minute(base + 60, 1.10, 1.12, 1.10, 1.11),
        ];
        let out = aggregate(&minutes, Timeframe::FifteenMin);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].low, dec!(1.09));
    }

    #[test]
    fn final_partial_bucket_is_still_emitted() {
        let base = 1_704_067_200i64;
        let minutes = vec![minute(base, 1.0, 1.0, 1.0, 1.0)];
        let out = aggregate(&minutes, Timeframe::FourHour);
        assert_eq!(out.len(), 1);
    }
}
