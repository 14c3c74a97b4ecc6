//! The broker boundary (C1). `BrokerClient` is one authenticated, persistent
//! session: `authorize` must be called once before any other method, and the
//! implementation is responsible for multiplexing concurrent logical callers
//! onto that one session (§4.1, §5).

use crate::domain::errors::BrokerError;
use crate::domain::market::candle::Candle;
use crate::domain::trading::types::ContractType;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct ProposalRequest {
    pub contract_type: ContractType,
    pub symbol: String,
    pub amount: Decimal,
    pub multiplier: u32,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

#[derive(Debug, Clone)]
pub struct ProposalResponse {
    pub proposal_id: String,
    pub ask_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractStatus {
    Open,
    Sold,
}

#[derive(Debug, Clone)]
pub struct ContractState {
    pub contract_id: String,
    pub status: ContractStatus,
    pub is_sold: bool,
    pub buy_price: Decimal,
    pub sell_price: Option<Decimal>,
    pub sell_time: Option<i64>,
    pub profit: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct ProfitTableEntry {
    pub contract_id: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub sell_time: i64,
    pub profit_loss: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct ProfitTable {
    pub transactions: Vec<ProfitTableEntry>,
}

/// One authenticated broker session. Every operation after `authorize` may
/// fail with `BrokerError::Transient` (retry locally, never propagate) or
/// `BrokerError::Auth` (permanent; caller stops trading for this token).
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn authorize(&self, token: &str) -> Result<(), BrokerError>;

    /// Closed one-minute candles in `[start, end)`, at most `count` of them.
    async fn ticks_history(
        &self,
        symbol: &str,
        start: i64,
        end: i64,
        count: u32,
    ) -> Result<Vec<Candle>, BrokerError>;

    async fn contracts_for(&self, symbol: &str) -> Result<Vec<String>, BrokerError>;

    async fn proposal(&self, req: &ProposalRequest) -> Result<ProposalResponse, BrokerError>;

    async fn buy(&self, proposal_id: &str, price: Decimal) -> Result<String, BrokerError>;

    async fn sell(&self, contract_id: &str, price: Decimal) -> Result<(), BrokerError>;

    async fn open_contract(&self, contract_id: &str) -> Result<ContractState, BrokerError>;

    async fn balance(&self) -> Result<Decimal, BrokerError>;

    async fn profit_table(&self, from: i64, to: i64) -> Result<ProfitTable, BrokerError>;
}

/// Opens a fresh, unauthenticated `BrokerClient` connection. Components that
/// need a session under a specific user's token (TradeMonitor, RiskSizer's
/// balance lookup) call `connect` then `authorize`; CandleIngestor shares one
/// long-lived connection across all symbols.
#[async_trait]
pub trait BrokerClientFactory: Send + Sync {
    async fn connect(&self) -> Result<std::sync::Arc<dyn BrokerClient>, BrokerError>;
}
