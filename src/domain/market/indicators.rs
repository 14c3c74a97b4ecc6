//! Pure Decimal indicator math shared by the strategy engine.
//!
//! These mirror the arithmetic of the moving-average/ATR/ADX calculations in
//! the prior-art Python strategy modules, translated to `Decimal` so that
//! signal generation stays bit-for-bit deterministic (§8 of the spec).

use crate::domain::market::candle::AggregatedCandle;
use rust_decimal::Decimal;

/// Simple moving average of `close` over the `period` candles ending at
/// (and including) `candles[end_index - 1]`. Returns `None` if there is not
/// enough history.
pub fn sma(candles: &[AggregatedCandle], end_index: usize, period: usize) -> Option<Decimal> {
    if period == 0 || end_index < period {
        return None;
    }
    let window = &candles[end_index - period..end_index];
    let sum: Decimal = window.iter().map(|c| c.close).sum();
    Some(sum / Decimal::from(period as u64))
}

fn true_range(curr: &AggregatedCandle, prev: &AggregatedCandle) -> Decimal {
    let hl = curr.high - curr.low;
    let hc = (curr.high - prev.close).abs();
    let lc = (curr.low - prev.close).abs();
    hl.max(hc).max(lc)
}

/// Average True Range over the last `period` bars of `candles`.
/// Returns `None` if there are not at least `period + 1` candles.
pub fn atr(candles: &[AggregatedCandle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let trs: Vec<Decimal> = (1..candles.len())
        .map(|i| true_range(&candles[i], &candles[i - 1]))
        .collect();
    let tail = &trs[trs.len() - period..];
    let sum: Decimal = tail.iter().copied().sum();
    Some(sum / Decimal::from(period as u64))
}

/// Average Directional Index over the last `period` bars of `candles`,
/// via Wilder-style directional movement smoothed over the same window
/// used for ATR. Returns `Decimal::ZERO` if the smoothed true range is
/// zero (flat market), matching the prior-art behavior of treating a
/// degenerate ADX as "no trend" rather than an error.
pub fn adx(candles: &[AggregatedCandle], period: usize) -> Decimal {
    if period == 0 || candles.len() < period + 1 {
        return Decimal::ZERO;
    }
    let mut dm_plus = Vec::with_capacity(candles.len() - 1);
    let mut dm_minus = Vec::with_capacity(candles.len() - 1);
    let mut tr = Vec::with_capacity(candles.len() - 1);
    for i in 1..candles.len() {
        dm_plus.push(candles[i].high - candles[i - 1].high);
        dm_minus.push(candles[i - 1].low - candles[i].low);
        tr.push(true_range(&candles[i], &candles[i - 1]));
    }
    let tail_sum = |v: &[Decimal]| -> Decimal {
        let tail = &v[v.len() - period..];
        tail.iter().copied().sum::<Decimal>() / Decimal::from(period as u64)
    };
    let smoothed_dm_plus = tail_sum(&dm_plus);
    let smoothed_dm_minus = tail_sum(&dm_minus);
    let smoothed_tr = tail_sum(&tr);
    if smoothed_tr.is_zero() {
        return Decimal::ZERO;
    }
    Decimal::from(100) * (smoothed_dm_plus - smoothed_dm_minus).abs() / smoothed_tr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(ts: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> AggregatedCandle {
        AggregatedCandle {
            symbol: "frxEURUSD".into(),
            timeframe: Timeframe::FourHour,
            ts,
            open: o,
            high: h,
            low: l,
            close: c,
        }
    }

    #[test]
    fn sma_averages_the_trailing_window() {
        let candles = vec![
            candle(0, dec!(1), dec!(1), dec!(1), dec!(10)),
            candle(1, dec!(1), dec!(1), dec!(1), dec!(20)),
            candle(2, dec!(1), dec!(1), dec!(1), dec!(30)),
        ];
        assert_eq!(sma(&candles, 3, 3), Some(dec!(20)));
        assert_eq!(sma(&candles, 2, 3), None);
    }

    #[test]
    fn atr_is_none_without_enough_history() {
        let candles = vec![candle(0, dec!(1), dec!(1.1), dec!(0.9), dec!(1))];
        assert_eq!(atr(&candles, 1), None);
    }

    #[test]
    fn atr_averages_true_range() {
        let candles = vec![
            candle(0, dec!(1), dec!(1.10), dec!(0.90), dec!(1.00)),
            candle(1, dec!(1), dec!(1.20), dec!(1.00), dec!(1.10)),
            candle(2, dec!(1), dec!(1.30), dec!(1.05), dec!(1.25)),
        ];
        // TR(1) = max(0.20, |1.20-1.00|, |1.00-1.00|) = 0.20
        // TR(2) = max(0.25, |1.30-1.10|, |1.05-1.10|) = 0.25
        assert_eq!(atr(&candles, 2), Some(dec!(0.225)));
    }

    #[test]
    fn adx_is_zero_on_flat_true_range() {
        let candles = vec![
            candle(0, dec!(1), dec!(1), dec!(1), dec!(1)),
            candle(1, dec!(1), dec!(1), dec!(1), dec!(1)),
        ];
        assert_eq!(adx(&candles, 1), Decimal::ZERO);
    }
}
