//! Repository Pattern abstractions for the Store (C2).
//!
//! One trait per table family, each implemented once against SQLite in
//! `infrastructure::persistence::repositories`. Writes are single-statement
//! and fire-and-forget (§4.2); no trait method here spans more than one
//! logical row change.

use crate::domain::errors::StoreError;
use crate::domain::market::candle::Candle;
use crate::domain::trading::types::{BalanceSnapshot, Risk, Signal, Trade, User, UserSymbol, Window};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

#[async_trait]
pub trait CandleRepository: Send + Sync {
    /// Idempotent upsert keyed on `(symbol, ts)` (§4.3 step 3).
    async fn upsert(&self, candle: &Candle) -> Result<(), StoreError>;

    /// One-minute candles for `symbol` with `ts` in `[since, until)`,
    /// ordered ascending by `ts`.
    async fn read_range(
        &self,
        symbol: &str,
        since: i64,
        until: i64,
    ) -> Result<Vec<Candle>, StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn all_trading(&self) -> Result<Vec<User>, StoreError>;
    async fn symbols_for(&self, email: &str) -> Result<Vec<UserSymbol>, StoreError>;
    async fn set_trading_flags(
        &self,
        email: &str,
        trading: bool,
        trading_today: bool,
    ) -> Result<(), StoreError>;
    async fn set_balance(&self, email: &str, balance: Decimal) -> Result<(), StoreError>;
    async fn set_balance_today(&self, email: &str, balance_today: Decimal) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RiskRepository: Send + Sync {
    /// Falls back to `Risk::default()` if no row exists for `email` (§3).
    async fn find_by_email(&self, email: &str) -> Result<Risk, StoreError>;
}

#[async_trait]
pub trait WindowRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Window>, StoreError>;
    async fn all(&self) -> Result<Vec<Window>, StoreError>;
    async fn starting_on(&self, date: NaiveDate) -> Result<Vec<Window>, StoreError>;
    async fn stopping_on(&self, date: NaiveDate) -> Result<Vec<Window>, StoreError>;
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn insert(&self, trade: &Trade) -> Result<(), StoreError>;

    /// Idempotent settlement update keyed on `contract_id` (§4.9 step 4).
    async fn settle(
        &self,
        contract_id: &str,
        sell_price: Decimal,
        sell_time: i64,
        buy_price: Decimal,
        profit_loss: Decimal,
    ) -> Result<(), StoreError>;

    async fn find_active(&self) -> Result<Vec<Trade>, StoreError>;
    async fn find_by_contract_id(&self, contract_id: &str) -> Result<Option<Trade>, StoreError>;
    async fn find_for_user_since(&self, email: &str, since: i64) -> Result<Vec<Trade>, StoreError>;
    async fn count_for_user_today(&self, email: &str, day_start: i64) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait SignalRepository: Send + Sync {
    async fn insert(&self, signal: &Signal) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BalanceRepository: Send + Sync {
    async fn insert_snapshot(&self, snapshot: &BalanceSnapshot) -> Result<(), StoreError>;
}
