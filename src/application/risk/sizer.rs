//! RiskSizer (C6): converts a signal and an account balance into a
//! stop-loss, take-profit, and position size. Everything here is pure
//! except `risk_amount`, which needs a balance lookup through the broker
//! and fails closed (returns zero) rather than propagating an error —
//! a non-trading user is always the safe default (§4.6).

use crate::domain::errors::StrategyError;
use crate::domain::ports::BrokerClient;
use crate::domain::trading::types::SignalKind;
use rust_decimal::Decimal;
use tracing::warn;

/// `entry ∓ buffer_pips * pip_value`: minus for Buy, plus for Sell.
pub fn stop_loss(
    entry: Decimal,
    kind: SignalKind,
    buffer_pips: Decimal,
    pip_value: Decimal,
) -> Decimal {
    let buffer = buffer_pips * pip_value;
    match kind {
        SignalKind::Buy => entry - buffer,
        SignalKind::Sell => entry + buffer,
    }
}

/// `entry ∓ distance`: minus for Buy, plus for Sell. Used where the stop
/// distance comes from a volatility measure (ATR) rather than a fixed pip
/// buffer.
pub fn stop_loss_by_distance(entry: Decimal, kind: SignalKind, distance: Decimal) -> Decimal {
    match kind {
        SignalKind::Buy => entry - distance,
        SignalKind::Sell => entry + distance,
    }
}

/// `entry ± reward_to_risk * |entry - sl|`. Fails if `entry == sl`
/// (degenerate risk geometry has no well-defined reward/risk ratio).
pub fn take_profit(
    entry: Decimal,
    sl: Decimal,
    kind: SignalKind,
    reward_to_risk: Decimal,
) -> Result<Decimal, StrategyError> {
    if entry == sl {
        return Err(StrategyError::DegenerateRisk { entry, sl });
    }
    let risk = (entry - sl).abs();
    Ok(match kind {
        SignalKind::Buy => entry + reward_to_risk * risk,
        SignalKind::Sell => entry - reward_to_risk * risk,
    })
}

/// `risk_amount / (|entry - sl| / pip_value)`, rounded to 2dp. Fails if
/// `entry == sl`.
pub fn position_size(
    risk_amount: Decimal,
    entry: Decimal,
    sl: Decimal,
    pip_value: Decimal,
) -> Result<Decimal, StrategyError> {
    if entry == sl {
        return Err(StrategyError::DegenerateRisk { entry, sl });
    }
    let pips_at_risk = (entry - sl).abs() / pip_value;
    let size = risk_amount / pips_at_risk;
    Ok(size.round_dp(2))
}

/// `balance(token) * risk_percentage`. Returns `Decimal::ZERO` on any
/// broker failure — sizing a trade at zero means the dispatcher skips it,
/// which is the safe behavior when the account state can't be confirmed.
pub async fn risk_amount(
    broker: &dyn BrokerClient,
    token: &str,
    risk_percentage: Decimal,
) -> Decimal {
    match broker.authorize(token).await {
        Ok(()) => {}
        Err(e) => {
            warn!(token_len = token.len(), error = %e, "risk_amount: authorize failed, defaulting to zero");
            return Decimal::ZERO;
        }
    }
    match broker.balance().await {
        Ok(balance) => balance * risk_percentage,
        Err(e) => {
            warn!(error = %e, "risk_amount: balance lookup failed, defaulting to zero");
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn stop_loss_subtracts_buffer_for_buy() {
        let sl = stop_loss(dec!(1.1035), SignalKind::Buy, dec!(20), dec!(0.0001));
        assert_eq!(sl, dec!(1.1015));
    }

    #[test]
    fn stop_loss_adds_buffer_for_sell() {
        let sl = stop_loss(dec!(1.1035), SignalKind::Sell, dec!(20), dec!(0.0001));
        assert_eq!(sl, dec!(1.1055));
    }

    #[test]
    fn stop_loss_by_distance_subtracts_for_buy_adds_for_sell() {
        assert_eq!(
            stop_loss_by_distance(dec!(1.10), SignalKind::Buy, dec!(0.003)),
            dec!(1.097)
        );
        assert_eq!(
            stop_loss_by_distance(dec!(1.10), SignalKind::Sell, dec!(0.003)),
            dec!(1.103)
        );
    }

    #[test]
    fn take_profit_scales_by_reward_to_risk() {
        let tp = take_profit(dec!(1.1035), dec!(1.1015), SignalKind::Buy, dec!(1.5)).unwrap();
        assert_eq!(tp, dec!(1.1065));
    }

    #[test]
    fn take_profit_rejects_degenerate_risk() {
        assert!(take_profit(dec!(1.10), dec!(1.10), SignalKind::Buy, dec!(2)).is_err());
    }

    #[test]
    fn position_size_divides_risk_by_pips_at_risk() {
        // 0.0020 price risk / 0.0001 pip = 20 pips; 100 / 20 = 5.00
        let size = position_size(dec!(100), dec!(1.1035), dec!(1.1015), dec!(0.0001)).unwrap();
        assert_eq!(size, dec!(5.00));
    }

    #[test]
    fn position_size_rejects_degenerate_risk() {
        assert!(position_size(dec!(100), dec!(1.10), dec!(1.10), dec!(0.0001)).is_err());
    }
}
