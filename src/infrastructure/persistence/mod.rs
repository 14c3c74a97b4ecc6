//! Store backend (C2): one SQLite-backed repository per table family,
//! composed behind a single `Store` handle that bootstrap hands to every
//! agent, mirroring the teacher's persistence-bootstrap/handle composition.

pub mod database;
pub mod repositories;

use crate::domain::repositories::{
    BalanceRepository, CandleRepository, RiskRepository, SignalRepository, TradeRepository,
    UserRepository, WindowRepository,
};
use database::Database;
use repositories::{
    SqliteBalanceRepository, SqliteCandleRepository, SqliteRiskRepository,
    SqliteSignalRepository, SqliteTradeRepository, SqliteUserRepository, SqliteWindowRepository,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct Store {
    pub candles: Arc<dyn CandleRepository>,
    pub users: Arc<dyn UserRepository>,
    pub risk: Arc<dyn RiskRepository>,
    pub windows: Arc<dyn WindowRepository>,
    pub trades: Arc<dyn TradeRepository>,
    pub signals: Arc<dyn SignalRepository>,
    pub balances: Arc<dyn BalanceRepository>,
}

impl Store {
    pub async fn connect(db_url: &str, symbol_tables: &HashMap<String, String>) -> anyhow::Result<Self> {
        let db = Database::new(db_url, symbol_tables).await?;
        Ok(Self {
            candles: Arc::new(SqliteCandleRepository::new(db.pool.clone(), symbol_tables.clone())),
            users: Arc::new(SqliteUserRepository::new(db.pool.clone())),
            risk: Arc::new(SqliteRiskRepository::new(db.pool.clone())),
            windows: Arc::new(SqliteWindowRepository::new(db.pool.clone())),
            trades: Arc::new(SqliteTradeRepository::new(db.pool.clone())),
            signals: Arc::new(SqliteSignalRepository::new(db.pool.clone())),
            balances: Arc::new(SqliteBalanceRepository::new(db.pool)),
        })
    }
}
