//! SQLite implementations of the domain repository traits (§4.2), one
//! struct per table family following the teacher's one-repository-per-table
//! convention. Decimal-valued columns round-trip through their canonical
//! string form (§3.1); writes are single-statement and idempotent where the
//! data model calls for it.

use crate::domain::errors::StoreError;
use crate::domain::market::candle::Candle;
use crate::domain::repositories::{
    BalanceRepository, CandleRepository, RiskRepository, SignalRepository, TradeRepository,
    UserRepository, WindowRepository,
};
use crate::domain::trading::types::{
    BalanceSnapshot, ContractType, Risk, Signal, Trade, TradeStatus, User, UserSymbol, Window,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::collections::HashMap;
use std::str::FromStr;

fn dec(row: &SqliteRow, col: &'static str, table: &str) -> Result<Decimal, StoreError> {
    let raw: String = row.try_get(col).map_err(|e| StoreError::Read {
        table: table.to_string(),
        reason: e.to_string(),
    })?;
    Decimal::from_str(&raw).map_err(|e| StoreError::Read {
        table: table.to_string(),
        reason: format!("malformed decimal in {col}: {e}"),
    })
}

fn read_err(table: &str, e: sqlx::Error) -> StoreError {
    StoreError::Read {
        table: table.to_string(),
        reason: e.to_string(),
    }
}

fn write_err(table: &str, e: sqlx::Error) -> StoreError {
    StoreError::Write {
        table: table.to_string(),
        reason: e.to_string(),
    }
}

/// Per-symbol candle tables. `symbol_tables` is the whitelisted
/// `SYMBOLS_TO_TABLES` map (§6) — the only source of a table name, so a
/// query is never built from caller-supplied input.
pub struct SqliteCandleRepository {
    pool: SqlitePool,
    symbol_tables: HashMap<String, String>,
}

impl SqliteCandleRepository {
    pub fn new(pool: SqlitePool, symbol_tables: HashMap<String, String>) -> Self {
        Self { pool, symbol_tables }
    }

    fn table_for(&self, symbol: &str) -> Result<&str, StoreError> {
        self.symbol_tables
            .get(symbol)
            .map(String::as_str)
            .ok_or_else(|| StoreError::UnknownSymbol {
                symbol: symbol.to_string(),
            })
    }
}

#[async_trait]
impl CandleRepository for SqliteCandleRepository {
    async fn upsert(&self, candle: &Candle) -> Result<(), StoreError> {
        let table = self.table_for(&candle.symbol)?;
        let sql = format!(
            r#"INSERT INTO "{table}" (symbol, ts, open, high, low, close)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(symbol, ts) DO UPDATE SET
                 open = excluded.open, high = excluded.high,
                 low = excluded.low, close = excluded.close"#
        );
        sqlx::query(&sql)
            .bind(&candle.symbol)
            .bind(candle.ts)
            .bind(candle.open.to_string())
            .bind(candle.high.to_string())
            .bind(candle.low.to_string())
            .bind(candle.close.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| write_err(table, e))?;
        Ok(())
    }

    async fn read_range(
        &self,
        symbol: &str,
        since: i64,
        until: i64,
    ) -> Result<Vec<Candle>, StoreError> {
        let table = self.table_for(symbol)?;
        let sql = format!(
            r#"SELECT symbol, ts, open, high, low, close FROM "{table}"
               WHERE ts >= ? AND ts < ? ORDER BY ts ASC"#
        );
        let rows = sqlx::query(&sql)
            .bind(since)
            .bind(until)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err(table, e))?;

        rows.iter()
            .map(|row| {
                Ok(Candle {
                    symbol: row.try_get("symbol").map_err(|e| read_err(table, e))?,
                    ts: row.try_get("ts").map_err(|e| read_err(table, e))?,
                    open: dec(row, "open", table)?,
                    high: dec(row, "high", table)?,
                    low: dec(row, "low", table)?,
                    close: dec(row, "close", table)?,
                })
            })
            .collect()
    }
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &SqliteRow) -> Result<User, StoreError> {
        let strategy_raw: String = row.try_get("strategy").map_err(|e| read_err("userdetails", e))?;
        Ok(User {
            email: row.try_get("email").map_err(|e| read_err("userdetails", e))?,
            token: row.try_get("token").map_err(|e| read_err("userdetails", e))?,
            strategy: strategy_raw
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            trading: row.try_get::<i64, _>("trading").map_err(|e| read_err("userdetails", e))? != 0,
            trading_today: row
                .try_get::<i64, _>("trading_today")
                .map_err(|e| read_err("userdetails", e))?
                != 0,
            balance: dec(row, "balance", "userdetails")?,
            balance_today: dec(row, "balance_today", "userdetails")?,
            created_at: row.try_get("created_at").map_err(|e| read_err("userdetails", e))?,
            started_at: row.try_get("started_at").map_err(|e| read_err("userdetails", e))?,
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM userdetails WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_err("userdetails", e))?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn all_trading(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT * FROM userdetails WHERE trading = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err("userdetails", e))?;
        rows.iter().map(Self::row_to_user).collect()
    }

    async fn symbols_for(&self, email: &str) -> Result<Vec<UserSymbol>, StoreError> {
        let rows = sqlx::query("SELECT * FROM symbols WHERE email = ?")
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err("symbols", e))?;
        rows.iter()
            .map(|row| {
                Ok(UserSymbol {
                    email: row.try_get("email").map_err(|e| read_err("symbols", e))?,
                    token: row.try_get("token").map_err(|e| read_err("symbols", e))?,
                    symbol: row.try_get("symbol").map_err(|e| read_err("symbols", e))?,
                    created_at: row.try_get("created_at").map_err(|e| read_err("symbols", e))?,
                })
            })
            .collect()
    }

    async fn set_trading_flags(
        &self,
        email: &str,
        trading: bool,
        trading_today: bool,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE userdetails SET trading = ?, trading_today = ? WHERE email = ?")
            .bind(trading)
            .bind(trading_today)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| write_err("userdetails", e))?;
        Ok(())
    }

    async fn set_balance(&self, email: &str, balance: Decimal) -> Result<(), StoreError> {
        sqlx::query("UPDATE userdetails SET balance = ? WHERE email = ?")
            .bind(balance.to_string())
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| write_err("userdetails", e))?;
        Ok(())
    }

    async fn set_balance_today(&self, email: &str, balance_today: Decimal) -> Result<(), StoreError> {
        sqlx::query("UPDATE userdetails SET balance_today = ? WHERE email = ?")
            .bind(balance_today.to_string())
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| write_err("userdetails", e))?;
        Ok(())
    }
}

pub struct SqliteRiskRepository {
    pool: SqlitePool,
}

impl SqliteRiskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RiskRepository for SqliteRiskRepository {
    async fn find_by_email(&self, email: &str) -> Result<Risk, StoreError> {
        let row = sqlx::query("SELECT * FROM risk_table WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_err("risk_table", e))?;
        match row {
            Some(row) => Ok(Risk {
                per_trade: dec(&row, "per_trade", "risk_table")?,
                per_day: dec(&row, "per_day", "risk_table")?,
            }),
            None => Ok(Risk::default()),
        }
    }
}

pub struct SqliteWindowRepository {
    pool: SqlitePool,
}

impl SqliteWindowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_window(row: &SqliteRow) -> Result<Window, StoreError> {
        let parse_date = |col: &'static str| -> Result<NaiveDate, StoreError> {
            let raw: String = row.try_get(col).map_err(|e| read_err("start_stop_table", e))?;
            NaiveDate::from_str(&raw).map_err(|e| StoreError::Read {
                table: "start_stop_table".to_string(),
                reason: format!("malformed date in {col}: {e}"),
            })
        };
        Ok(Window {
            email: row.try_get("email").map_err(|e| read_err("start_stop_table", e))?,
            start_date: parse_date("start_date")?,
            stop_date: parse_date("stop_date")?,
            loss_per_day: dec(row, "loss_per_day", "start_stop_table")?,
            overall_loss: dec(row, "overall_loss", "start_stop_table")?,
            win_per_day: dec(row, "win_per_day", "start_stop_table")?,
            overall_win: dec(row, "overall_win", "start_stop_table")?,
        })
    }
}

#[async_trait]
impl WindowRepository for SqliteWindowRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Window>, StoreError> {
        let row = sqlx::query("SELECT * FROM start_stop_table WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_err("start_stop_table", e))?;
        row.as_ref().map(Self::row_to_window).transpose()
    }

    async fn all(&self) -> Result<Vec<Window>, StoreError> {
        let rows = sqlx::query("SELECT * FROM start_stop_table")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err("start_stop_table", e))?;
        rows.iter().map(Self::row_to_window).collect()
    }

    async fn starting_on(&self, date: NaiveDate) -> Result<Vec<Window>, StoreError> {
        let rows = sqlx::query("SELECT * FROM start_stop_table WHERE start_date = ?")
            .bind(date.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err("start_stop_table", e))?;
        rows.iter().map(Self::row_to_window).collect()
    }

    async fn stopping_on(&self, date: NaiveDate) -> Result<Vec<Window>, StoreError> {
        let rows = sqlx::query("SELECT * FROM start_stop_table WHERE stop_date = ?")
            .bind(date.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err("start_stop_table", e))?;
        rows.iter().map(Self::row_to_window).collect()
    }
}

pub struct SqliteTradeRepository {
    pool: SqlitePool,
}

impl SqliteTradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_trade(row: &SqliteRow) -> Result<Trade, StoreError> {
        let status_raw: String = row.try_get("trade_status").map_err(|e| read_err("trades", e))?;
        let trade_status = match status_raw.as_str() {
            "complete" => TradeStatus::Complete,
            _ => TradeStatus::Active,
        };
        let contract_type_raw: String =
            row.try_get("contract_type").map_err(|e| read_err("trades", e))?;
        let contract_type = match contract_type_raw.as_str() {
            "MULTDOWN" => ContractType::MultDown,
            _ => ContractType::MultUp,
        };
        let sell_price: Option<String> = row.try_get("sell_price").map_err(|e| read_err("trades", e))?;
        let profit_loss: Option<String> = row.try_get("profit_loss").map_err(|e| read_err("trades", e))?;

        Ok(Trade {
            contract_id: row.try_get("contract_id").map_err(|e| read_err("trades", e))?,
            email: row.try_get("email").map_err(|e| read_err("trades", e))?,
            token: row.try_get("token").map_err(|e| read_err("trades", e))?,
            symbol: row.try_get("symbol").map_err(|e| read_err("trades", e))?,
            timestamp: row.try_get("timestamp").map_err(|e| read_err("trades", e))?,
            trade_status,
            amount: dec(row, "amount", "trades")?,
            multiplier: row.try_get::<i64, _>("multiplier").map_err(|e| read_err("trades", e))? as u32,
            contract_type,
            currency: row.try_get("currency").map_err(|e| read_err("trades", e))?,
            take_profit: dec(row, "take_profit", "trades")?,
            stop_loss: dec(row, "stop_loss", "trades")?,
            buy_price: dec(row, "buy_price", "trades")?,
            sell_price: sell_price
                .map(|s| Decimal::from_str(&s))
                .transpose()
                .map_err(|e: rust_decimal::Error| StoreError::Read {
                    table: "trades".to_string(),
                    reason: e.to_string(),
                })?,
            sell_time: row.try_get("sell_time").map_err(|e| read_err("trades", e))?,
            profit_loss: profit_loss
                .map(|s| Decimal::from_str(&s))
                .transpose()
                .map_err(|e: rust_decimal::Error| StoreError::Read {
                    table: "trades".to_string(),
                    reason: e.to_string(),
                })?,
        })
    }
}

#[async_trait]
impl TradeRepository for SqliteTradeRepository {
    async fn insert(&self, trade: &Trade) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                contract_id, email, token, symbol, timestamp, trade_status,
                amount, multiplier, contract_type, currency,
                take_profit, stop_loss, buy_price, sell_price, sell_time, profit_loss
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(contract_id) DO NOTHING
            "#,
        )
        .bind(&trade.contract_id)
        .bind(&trade.email)
        .bind(&trade.token)
        .bind(&trade.symbol)
        .bind(trade.timestamp)
        .bind(trade.trade_status.to_string())
        .bind(trade.amount.to_string())
        .bind(trade.multiplier as i64)
        .bind(trade.contract_type.to_string())
        .bind(&trade.currency)
        .bind(trade.take_profit.to_string())
        .bind(trade.stop_loss.to_string())
        .bind(trade.buy_price.to_string())
        .bind(trade.sell_price.map(|d| d.to_string()))
        .bind(trade.sell_time)
        .bind(trade.profit_loss.map(|d| d.to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("trades", e))?;
        Ok(())
    }

    async fn settle(
        &self,
        contract_id: &str,
        sell_price: Decimal,
        sell_time: i64,
        buy_price: Decimal,
        profit_loss: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE trades SET
                trade_status = 'complete',
                sell_price = ?,
                sell_time = ?,
                buy_price = ?,
                profit_loss = ?
            WHERE contract_id = ? AND trade_status = 'active'
            "#,
        )
        .bind(sell_price.to_string())
        .bind(sell_time)
        .bind(buy_price.to_string())
        .bind(profit_loss.to_string())
        .bind(contract_id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("trades", e))?;
        Ok(())
    }

    async fn find_active(&self) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query("SELECT * FROM trades WHERE trade_status = 'active'")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err("trades", e))?;
        rows.iter().map(Self::row_to_trade).collect()
    }

    async fn find_by_contract_id(&self, contract_id: &str) -> Result<Option<Trade>, StoreError> {
        let row = sqlx::query("SELECT * FROM trades WHERE contract_id = ?")
            .bind(contract_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_err("trades", e))?;
        row.as_ref().map(Self::row_to_trade).transpose()
    }

    async fn find_for_user_since(&self, email: &str, since: i64) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query("SELECT * FROM trades WHERE email = ? AND timestamp >= ?")
            .bind(email)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err("trades", e))?;
        rows.iter().map(Self::row_to_trade).collect()
    }

    async fn count_for_user_today(&self, email: &str, day_start: i64) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM trades WHERE email = ? AND timestamp >= ?",
        )
        .bind(email)
        .bind(day_start)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| read_err("trades", e))?;
        let count: i64 = row.try_get("count").map_err(|e| read_err("trades", e))?;
        Ok(count as u64)
    }
}

pub struct SqliteSignalRepository {
    pool: SqlitePool,
}

impl SqliteSignalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalRepository for SqliteSignalRepository {
    async fn insert(&self, signal: &Signal) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO trading_signals (pair, kind, entry, sl, tp, strategy, ts, extras)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&signal.pair)
        .bind(signal.kind.to_string())
        .bind(signal.entry.to_string())
        .bind(signal.sl.to_string())
        .bind(signal.tp.to_string())
        .bind(&signal.strategy)
        .bind(signal.ts)
        .bind(signal.extras.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("trading_signals", e))?;
        Ok(())
    }
}

pub struct SqliteBalanceRepository {
    pool: SqlitePool,
}

impl SqliteBalanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceRepository for SqliteBalanceRepository {
    async fn insert_snapshot(&self, snapshot: &BalanceSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO balances (email, timestamp, balance) VALUES (?, ?, ?)
            ON CONFLICT(email, timestamp) DO NOTHING
            "#,
        )
        .bind(&snapshot.email)
        .bind(snapshot.timestamp)
        .bind(snapshot.balance.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("balances", e))?;
        Ok(())
    }
}

