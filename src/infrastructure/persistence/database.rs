//! Store backend (C2, §3.1). A local SQLite database stands in for the
//! opaque columnar backend the spec treats as external: one table per
//! candle symbol (from the whitelisted symbol→table map) plus the fixed
//! `userdetails`/`symbols`/`risk_table`/`start_stop_table`/`trades`/
//! `trading_signals`/`balances` tables. Schema creation is idempotent,
//! run once at construction, exactly as the Store contract requires.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str, symbol_tables: &HashMap<String, String>) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to SQLite database")?;

        info!(db_url, "connected to store");

        let db = Self { pool };
        db.init(symbol_tables).await?;
        Ok(db)
    }

    async fn init(&self, symbol_tables: &HashMap<String, String>) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        for table in symbol_tables.values() {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS "{table}" (
                    symbol TEXT NOT NULL,
                    ts INTEGER NOT NULL,
                    open TEXT NOT NULL,
                    high TEXT NOT NULL,
                    low TEXT NOT NULL,
                    close TEXT NOT NULL,
                    PRIMARY KEY (symbol, ts)
                );
                "#
            );
            sqlx::query(&ddl)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("failed to create candle table {table}"))?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS userdetails (
                email TEXT PRIMARY KEY,
                token TEXT NOT NULL,
                strategy TEXT NOT NULL,
                trading INTEGER NOT NULL,
                trading_today INTEGER NOT NULL,
                balance TEXT NOT NULL,
                balance_today TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                started_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create userdetails table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS symbols (
                email TEXT NOT NULL,
                token TEXT NOT NULL,
                symbol TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (email, symbol)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create symbols table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS risk_table (
                email TEXT PRIMARY KEY,
                per_trade TEXT NOT NULL,
                per_day TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create risk_table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS start_stop_table (
                email TEXT PRIMARY KEY,
                start_date TEXT NOT NULL,
                stop_date TEXT NOT NULL,
                loss_per_day TEXT NOT NULL,
                overall_loss TEXT NOT NULL,
                win_per_day TEXT NOT NULL,
                overall_win TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create start_stop_table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                contract_id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                token TEXT NOT NULL,
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                trade_status TEXT NOT NULL,
                amount TEXT NOT NULL,
                multiplier INTEGER NOT NULL,
                contract_type TEXT NOT NULL,
                currency TEXT NOT NULL,
                take_profit TEXT NOT NULL,
                stop_loss TEXT NOT NULL,
                buy_price TEXT NOT NULL,
                sell_price TEXT,
                sell_time INTEGER,
                profit_loss TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_trades_email ON trades (email, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trading_signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pair TEXT NOT NULL,
                kind TEXT NOT NULL,
                entry TEXT NOT NULL,
                sl TEXT NOT NULL,
                tp TEXT NOT NULL,
                strategy TEXT NOT NULL,
                ts INTEGER NOT NULL,
                extras TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create trading_signals table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS balances (
                email TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                balance TEXT NOT NULL,
                PRIMARY KEY (email, timestamp)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create balances table")?;

        info!("store schema initialized");
        Ok(())
    }
}
