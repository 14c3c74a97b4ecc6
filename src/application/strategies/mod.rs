//! Pure signal-generation functions (C5). Each strategy is a deterministic
//! function over aggregated candle slices; none of them touch the broker or
//! the store, which is what makes §8's determinism property checkable.

pub mod malaysian;
pub mod moving_average;

use rust_decimal::Decimal;

/// Strategy-level constants carried from `Config` into the pure strategy
/// functions, so the functions themselves stay free of any I/O dependency.
#[derive(Debug, Clone, Copy)]
pub struct StrategyConstants {
    pub pip_value: Decimal,
    pub default_buffer_pips: Decimal,
    pub low_risk_ratio: Decimal,
    pub high_risk_ratio: Decimal,
    pub reward_to_risk_ratio: Decimal,
    pub atr_period: usize,
    pub adx_threshold: Decimal,
}

impl From<&crate::config::Config> for StrategyConstants {
    fn from(cfg: &crate::config::Config) -> Self {
        Self {
            pip_value: cfg.pip_value,
            default_buffer_pips: cfg.default_buffer_pips,
            low_risk_ratio: cfg.low_risk_ratio,
            high_risk_ratio: cfg.high_risk_ratio,
            reward_to_risk_ratio: cfg.reward_to_risk_ratio,
            atr_period: cfg.atr_period,
            adx_threshold: cfg.adx_threshold,
        }
    }
}
