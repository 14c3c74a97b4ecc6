//! MovingAverage strategy (§4.5.2 + §4.5.3): a four-way SMA crossover over
//! 4-hour candles `H`, confirmed against the same crossover on 30-minute
//! candles `M30`, gated by ATR (non-degenerate stop distance) and ADX
//! (trend strength) computed over `H`.

use super::StrategyConstants;
use crate::application::risk::sizer;
use crate::domain::market::candle::AggregatedCandle;
use crate::domain::market::indicators::{adx, atr, sma};
use crate::domain::trading::types::{Signal, SignalKind};
use rust_decimal::Decimal;

const STRATEGY_NAME: &str = "MovingAverage";
const PERIODS: [usize; 4] = [7, 14, 89, 200];
const MIN_HISTORY: usize = 200;
const ATR_SL_MULTIPLIER: Decimal = Decimal::from_parts(15, 0, 0, false, 1); // 1.5

/// `Some((short_above_mid, long_above_long_term))` at candle index `i`
/// (inclusive), or `None` if there isn't enough history for all four SMAs.
fn crossover_state(candles: &[AggregatedCandle], i: usize) -> Option<(bool, bool)> {
    let end = i + 1;
    let [ma7, ma14, ma89, ma200] = PERIODS.map(|p| sma(candles, end, p));
    Some((ma7? > ma14?, ma89? > ma200?))
}

fn detect_crossover(candles: &[AggregatedCandle], i: usize) -> Option<SignalKind> {
    if i == 0 {
        return None;
    }
    let (short_above_now, long_above_now) = crossover_state(candles, i)?;
    let (short_above_prev, long_above_prev) = crossover_state(candles, i - 1)?;
    if short_above_now && long_above_now && !(short_above_prev && long_above_prev) {
        Some(SignalKind::Buy)
    } else if !short_above_now && !long_above_now && (short_above_prev || long_above_prev) {
        Some(SignalKind::Sell)
    } else {
        None
    }
}

/// Evaluates the strategy over `H`, confirming each crossover against the
/// latest two bars of `M30` and gating on ATR/ADX (§4.5.3). Pure.
pub fn evaluate(
    h: &[AggregatedCandle],
    m30: &[AggregatedCandle],
    symbol: &str,
    c: StrategyConstants,
) -> Vec<Signal> {
    let mut signals = Vec::new();
    if h.len() < MIN_HISTORY {
        return signals;
    }

    for i in MIN_HISTORY..h.len() {
        let Some(kind) = detect_crossover(h, i) else {
            continue;
        };

        let m30_len = m30.len();
        if m30_len < 2 {
            continue;
        }
        let Some(confirming) = detect_crossover(m30, m30_len - 1) else {
            continue;
        };
        if confirming != kind {
            continue;
        }

        let window = &h[..=i];
        let Some(atr_value) = atr(window, c.atr_period) else {
            continue;
        };
        if atr_value.is_zero() {
            continue;
        }

        if adx(window, c.atr_period) < c.adx_threshold {
            continue;
        }

        let entry = h[i].close;
        let sl = sizer::stop_loss_by_distance(entry, kind, atr_value * ATR_SL_MULTIPLIER);
        let Ok(tp) = sizer::take_profit(entry, sl, kind, c.reward_to_risk_ratio) else {
            continue;
        };

        if (sl - entry).abs() < c.pip_value || (tp - entry).abs() < c.pip_value {
            continue;
        }

        signals.push(Signal {
            pair: symbol.to_string(),
            kind,
            entry,
            sl,
            tp,
            strategy: STRATEGY_NAME.to_string(),
            ts: h[i].ts,
            extras: serde_json::Value::Null,
        });
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn constants() -> StrategyConstants {
        StrategyConstants {
            pip_value: dec!(0.0001),
            default_buffer_pips: dec!(20),
            low_risk_ratio: dec!(1.5),
            high_risk_ratio: dec!(2),
            reward_to_risk_ratio: dec!(2),
            atr_period: 14,
            adx_threshold: dec!(0), // disable the trend-strength gate in unit tests
        }
    }

    fn flat(ts: i64, close: Decimal, tf: Timeframe) -> AggregatedCandle {
        AggregatedCandle {
            symbol: "frxEURUSD".into(),
            timeframe: tf,
            ts,
            open: close,
            high: close + dec!(0.0005),
            low: close - dec!(0.0005),
            close,
        }
    }

    #[test]
    fn insufficient_history_yields_no_signals() {
        let h: Vec<_> = (0..199)
            .map(|i| flat(i as i64 * 14400, dec!(1.10), Timeframe::FourHour))
            .collect();
        assert!(evaluate(&h, &[], "frxEURUSD", constants()).is_empty());
    }

    #[test]
    fn steady_uptrend_with_no_crossover_emits_nothing() {
        // A strictly increasing series never produces a crossover because
        // every MA stays in the same relative order throughout.
        let h: Vec<_> = (0..250)
            .map(|i| flat(i as i64 * 14400, dec!(1.0000) + Decimal::from(i) * dec!(0.0001), Timeframe::FourHour))
            .collect();
        let m30: Vec<_> = (0..10)
            .map(|i| flat(i as i64 * 1800, dec!(1.02) + Decimal::from(i) * dec!(0.0001), Timeframe::ThirtyMin))
            .collect();
        let signals = evaluate(&h, &m30, "frxEURUSD", constants());
        assert!(signals.is_empty());
    }
}
