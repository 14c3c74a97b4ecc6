use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Buy,
    Sell,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "Buy"),
            SignalKind::Sell => write!(f, "Sell"),
        }
    }
}

/// A multiplier contract direction. `MultUp` is long, `MultDown` short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractType {
    MultUp,
    MultDown,
}

impl From<SignalKind> for ContractType {
    fn from(kind: SignalKind) -> Self {
        match kind {
            SignalKind::Buy => ContractType::MultUp,
            SignalKind::Sell => ContractType::MultDown,
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractType::MultUp => write!(f, "MULTUP"),
            ContractType::MultDown => write!(f, "MULTDOWN"),
        }
    }
}

/// Output of the strategy engine. Transient between StrategyEngine and
/// TradeDispatcher, persisted to `trading_signals` for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub pair: String,
    pub kind: SignalKind,
    pub entry: Decimal,
    pub sl: Decimal,
    pub tp: Decimal,
    pub strategy: String,
    pub ts: i64,
    pub extras: serde_json::Value,
}

impl Signal {
    /// Reward-to-risk ratio of this signal: `|tp - entry| / |entry - sl|`.
    /// `None` if entry and sl coincide (degenerate risk).
    pub fn reward_to_risk(&self) -> Option<Decimal> {
        let risk = (self.entry - self.sl).abs();
        if risk.is_zero() {
            return None;
        }
        Some((self.tp - self.entry).abs() / risk)
    }

    /// Signal-sanity invariant from §8: Buy needs `tp > entry > sl`, Sell
    /// needs `tp < entry < sl`.
    pub fn is_sane(&self) -> bool {
        match self.kind {
            SignalKind::Buy => self.tp > self.entry && self.entry > self.sl,
            SignalKind::Sell => self.tp < self.entry && self.entry < self.sl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Active,
    Complete,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Active => write!(f, "active"),
            TradeStatus::Complete => write!(f, "complete"),
        }
    }
}

/// A dispatched and (eventually) settled position. `contract_id` is the
/// broker-assigned, globally unique key. `trade_status` moves from `Active`
/// to `Complete` at most once (§3 invariant 2); settlement fields are `None`
/// until that transition and immutable afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub contract_id: String,
    pub email: String,
    pub token: String,
    pub symbol: String,
    pub timestamp: i64,
    pub trade_status: TradeStatus,
    pub amount: Decimal,
    pub multiplier: u32,
    pub contract_type: ContractType,
    pub currency: String,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub buy_price: Decimal,
    pub sell_price: Option<Decimal>,
    pub sell_time: Option<i64>,
    pub profit_loss: Option<Decimal>,
}

impl Trade {
    /// Applies a settlement. Only valid from `Active`; callers must check
    /// `trade_status` before calling (idempotence is the Store's job, keyed
    /// on `contract_id`).
    pub fn settle(&mut self, sell_price: Decimal, sell_time: i64, buy_price: Decimal) {
        self.buy_price = buy_price;
        self.profit_loss = Some((sell_price - buy_price) * Decimal::from(self.multiplier));
        self.sell_price = Some(sell_price);
        self.sell_time = Some(sell_time);
        self.trade_status = TradeStatus::Complete;
    }
}

/// A trading-enabled account. `trading_today` is a soft enable flipped by
/// eligibility checks and the daily reset; `trading` is the hard master
/// switch. Invariant: `trading_today => trading`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub token: String,
    pub strategy: Vec<String>,
    pub trading: bool,
    pub trading_today: bool,
    pub balance: Decimal,
    pub balance_today: Decimal,
    pub created_at: i64,
    pub started_at: i64,
}

impl User {
    pub fn invariant_holds(&self) -> bool {
        !self.trading_today || self.trading
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSymbol {
    pub email: String,
    pub token: String,
    pub symbol: String,
    pub created_at: i64,
}

/// Per-trade and per-day risk percentages. `per_trade` defaults to 1 if the
/// store has no row for a user (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Risk {
    pub per_trade: Decimal,
    pub per_day: Decimal,
}

impl Default for Risk {
    fn default() -> Self {
        Self {
            per_trade: Decimal::ONE,
            per_day: Decimal::ONE,
        }
    }
}

impl Risk {
    /// `per_day / per_trade`, the maximum number of trades per day (§4.7).
    pub fn max_trades_per_day(&self) -> Decimal {
        self.per_day / self.per_trade
    }
}

/// The lifecycle window and P/L caps that gate a user's eligibility (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    pub email: String,
    pub start_date: chrono::NaiveDate,
    pub stop_date: chrono::NaiveDate,
    pub loss_per_day: Decimal,
    pub overall_loss: Decimal,
    pub win_per_day: Decimal,
    pub overall_win: Decimal,
}

/// Append-only balance history, one row per Scheduler snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub email: String,
    pub timestamp: i64,
    pub balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_signal(kind: SignalKind, entry: Decimal, sl: Decimal, tp: Decimal) -> Signal {
        Signal {
            pair: "frxEURUSD".into(),
            kind,
            entry,
            sl,
            tp,
            strategy: "Malaysian".into(),
            ts: 0,
            extras: serde_json::Value::Null,
        }
    }

    #[test]
    fn buy_signal_sanity_requires_tp_above_entry_above_sl() {
        let s = sample_signal(SignalKind::Buy, dec!(1.1035), dec!(1.1000), dec!(1.1100));
        assert!(s.is_sane());
        let bad = sample_signal(SignalKind::Buy, dec!(1.1035), dec!(1.1100), dec!(1.1200));
        assert!(!bad.is_sane());
    }

    #[test]
    fn sell_signal_sanity_requires_tp_below_entry_below_sl() {
        let s = sample_signal(SignalKind::Sell, dec!(1.1035), dec!(1.1100), dec!(1.0900));
        assert!(s.is_sane());
    }

    #[test]
    fn reward_to_risk_is_none_on_degenerate_risk() {
        let s = sample_signal(SignalKind::Buy, dec!(1.10), dec!(1.10), dec!(1.20));
        assert_eq!(s.reward_to_risk(), None);
    }

    #[test]
    fn trade_settle_computes_profit_loss_with_multiplier() {
        let mut t = Trade {
            contract_id: "X".into(),
            email: "u@example.com".into(),
            token: "tok".into(),
            symbol: "frxEURUSD".into(),
            timestamp: 0,
            trade_status: TradeStatus::Active,
            amount: dec!(10),
            multiplier: 30,
            contract_type: ContractType::MultUp,
            currency: "USD".into(),
            take_profit: dec!(1.12),
            stop_loss: dec!(1.10),
            buy_price: dec!(10),
            sell_price: None,
            sell_time: None,
            profit_loss: None,
        };
        t.settle(dec!(12.5), 100, dec!(10));
        assert_eq!(t.trade_status, TradeStatus::Complete);
        assert_eq!(t.profit_loss, Some(dec!(75.0)));
    }

    #[test]
    fn user_invariant_rejects_trading_today_without_trading() {
        let u = User {
            email: "u@example.com".into(),
            token: "tok".into(),
            strategy: vec!["Malaysian".into()],
            trading: false,
            trading_today: true,
            balance: dec!(1000),
            balance_today: dec!(1000),
            created_at: 0,
            started_at: 0,
        };
        assert!(!u.invariant_holds());
    }

    #[test]
    fn risk_max_trades_per_day_divides_per_day_by_per_trade() {
        let r = Risk {
            per_trade: dec!(2),
            per_day: dec!(10),
        };
        assert_eq!(r.max_trades_per_day(), dec!(5));
    }
}
