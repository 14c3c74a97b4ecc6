//! Malaysian strategy (§4.5.1): a pattern-plus-confirmation strategy over
//! 4-hour candles `H`, confirmed against 15-minute candles `M`, then
//! tightened against the 15-minute candles that follow the signal bar.

use super::StrategyConstants;
use crate::application::risk::sizer;
use crate::domain::market::candle::AggregatedCandle;
use crate::domain::trading::types::{Signal, SignalKind};

const STRATEGY_NAME: &str = "Malaysian";

/// Evaluates the strategy over the full `H`/`M` history, returning every
/// signal that survives confirmation and the reward/risk floor. Pure:
/// identical inputs always produce identical output (§8).
pub fn evaluate(
    h: &[AggregatedCandle],
    m: &[AggregatedCandle],
    symbol: &str,
    c: StrategyConstants,
) -> Vec<Signal> {
    let mut signals = Vec::new();
    if h.len() < 2 {
        return signals;
    }
    for i in 1..h.len() {
        let prev = &h[i - 1];
        let curr = &h[i];

        let kind = if prev.low < curr.low && prev.close < curr.close {
            SignalKind::Buy
        } else if prev.high > curr.high && prev.close > curr.close {
            SignalKind::Sell
        } else {
            continue;
        };

        let half_width = c.pip_value * rust_decimal::Decimal::from(2);
        let zone_low = prev.open - half_width;
        let zone_high = prev.open + half_width;

        let confirmed = m.iter().any(|bar| {
            bar.ts <= curr.ts
                && bar.ts >= curr.ts - 4 * 3600
                && match kind {
                    SignalKind::Buy => {
                        bar.low >= zone_low && bar.low <= zone_high && bar.close > bar.open
                    }
                    SignalKind::Sell => {
                        bar.high >= zone_low && bar.high <= zone_high && bar.close < bar.open
                    }
                }
        });
        if !confirmed {
            continue;
        }

        let entry = curr.close;
        let sl = sizer::stop_loss(entry, kind, c.default_buffer_pips, c.pip_value);
        let Ok(tp) = sizer::take_profit(entry, sl, kind, c.low_risk_ratio) else {
            continue;
        };

        let (sl, tp) = tighten(h, m, curr.ts, kind, entry, sl, tp, c.high_risk_ratio);

        let risk = (entry - sl).abs();
        if risk.is_zero() {
            continue;
        }
        let reward = (tp - entry).abs();
        if reward / risk < rust_decimal::Decimal::from(2) {
            continue;
        }

        signals.push(Signal {
            pair: symbol.to_string(),
            kind,
            entry,
            sl,
            tp,
            strategy: STRATEGY_NAME.to_string(),
            ts: curr.ts,
            extras: serde_json::Value::Null,
        });
    }
    signals
}

/// Tightens SL/TP against the 15-minute candles that follow the signal
/// bar: SL only ever moves toward entry... no — toward the intervening
/// extreme (lower for Buy, higher for Sell), TP only ever widens toward
/// the intervening extreme on the favorable side. Finally enforces the
/// minimum reward/risk by widening TP if needed.
#[allow(clippy::too_many_arguments)]
fn tighten(
    _h: &[AggregatedCandle],
    m: &[AggregatedCandle],
    signal_ts: i64,
    kind: SignalKind,
    entry: rust_decimal::Decimal,
    mut sl: rust_decimal::Decimal,
    mut tp: rust_decimal::Decimal,
    high_risk_ratio: rust_decimal::Decimal,
) -> (rust_decimal::Decimal, rust_decimal::Decimal) {
    for bar in m.iter().filter(|b| b.ts > signal_ts) {
        match kind {
            SignalKind::Buy => {
                if bar.low < sl {
                    sl = bar.low;
                }
                if bar.high > tp {
                    tp = bar.high;
                }
            }
            SignalKind::Sell => {
                if bar.high > sl {
                    sl = bar.high;
                }
                if bar.low < tp {
                    tp = bar.low;
                }
            }
        }
    }

    let risk = (entry - sl).abs();
    if !risk.is_zero() {
        let min_reward = high_risk_ratio * risk;
        let reward = (tp - entry).abs();
        if reward < min_reward {
            tp = match kind {
                SignalKind::Buy => entry + min_reward,
                SignalKind::Sell => entry - min_reward,
            };
        }
    }
    (sl, tp)
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
            adx_threshold: dec!(20),
        }
    }

    fn bar(ts: i64, o: rust_decimal::Decimal, h: rust_decimal::Decimal, l: rust_decimal::Decimal, c: rust_decimal::Decimal) -> AggregatedCandle {
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

    fn m15(ts: i64, o: rust_decimal::Decimal, h: rust_decimal::Decimal, l: rust_decimal::Decimal, c: rust_decimal::Decimal) -> AggregatedCandle {
        AggregatedCandle {
            symbol: "frxEURUSD".into(),
            timeframe: Timeframe::FifteenMin,
            ts,
            open: o,
            high: h,
            low: l,
            close: c,
        }
    }

    // S1 from the testable-properties scenarios: four 4h candles, last two
    // satisfy the Buy pattern, one confirming 15m bar in the safe zone.
    #[test]
    fn emits_buy_signal_on_confirmed_pattern() {
        let base = 0i64;
        let step = 4 * 3600;
        let h = vec![
            bar(base, dec!(1.0990), dec!(1.1005), dec!(1.0985), dec!(1.1000)),
            bar(base + step, dec!(1.1000), dec!(1.1015), dec!(1.0995), dec!(1.1010)),
            bar(base + 2 * step, dec!(1.1010), dec!(1.1025), dec!(1.1000), dec!(1.1020)),
            bar(base + 3 * step, dec!(1.1020), dec!(1.1040), dec!(1.1005), dec!(1.1035)),
        ];
        // Confirmation on the prev.open (1.1010) zone: low = 1.1010 - 0.0001
        let m = vec![m15(
            base + 3 * step - 60,
            dec!(1.1009),
            dec!(1.1012),
            dec!(1.1009),
            dec!(1.1011),
        )];
        let signals = evaluate(&h, &m, "frxEURUSD", constants());
        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert_eq!(s.kind, SignalKind::Buy);
        assert_eq!(s.entry, dec!(1.1035));
        assert!(s.is_sane());
    }

    #[test]
    fn no_signal_without_confirmation() {
        let base = 0i64;
        let step = 4 * 3600;
        let h = vec![
            bar(base, dec!(1.0990), dec!(1.1005), dec!(1.0985), dec!(1.1000)),
            bar(base + step, dec!(1.1000), dec!(1.1015), dec!(1.0995), dec!(1.1010)),
        ];
        let signals = evaluate(&h, &[], "frxEURUSD", constants());
        assert!(signals.is_empty());
    }

    #[test]
    fn insufficient_history_yields_no_signals() {
        let h = vec![bar(0, dec!(1), dec!(1), dec!(1), dec!(1))];
        assert!(evaluate(&h, &[], "frxEURUSD", constants()).is_empty());
    }
}
