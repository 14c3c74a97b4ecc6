//! In-memory `BrokerClient` for tests, grounded on the teacher's
//! `MockMarketDataService`/`MockExecutionService`: a `Clone`-able handle
//! around `Arc<RwLock<...>>` state that test setup seeds before exercising
//! the system under test (§8 scenarios S1-S6).

use crate::domain::errors::BrokerError;
use crate::domain::market::candle::Candle;
use crate::domain::ports::{
    BrokerClient, ContractState, ContractStatus, ProfitTable, ProfitTableEntry, ProposalRequest,
    ProposalResponse,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

struct MockState {
    authorized_tokens: HashSet<String>,
    reject_auth: bool,
    balance: Decimal,
    next_id: u64,
    proposal_ask_price: Decimal,
    candles: HashMap<String, Vec<Candle>>,
    contracts: HashMap<String, ContractState>,
    profit_table: ProfitTable,
    buy_calls: Vec<(String, Decimal)>,
    sell_calls: Vec<(String, Decimal)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            authorized_tokens: HashSet::new(),
            reject_auth: false,
            balance: Decimal::ZERO,
            next_id: 1,
            proposal_ask_price: Decimal::ONE,
            candles: HashMap::new(),
            contracts: HashMap::new(),
            profit_table: ProfitTable::default(),
            buy_calls: Vec::new(),
            sell_calls: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct MockBrokerClient {
    state: Arc<RwLock<MockState>>,
}

impl Default for MockBrokerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrokerClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
        }
    }

    pub async fn set_balance(&self, balance: Decimal) {
        self.state.write().await.balance = balance;
    }

    pub async fn set_reject_auth(&self, reject: bool) {
        self.state.write().await.reject_auth = reject;
    }

    pub async fn set_proposal_ask_price(&self, price: Decimal) {
        self.state.write().await.proposal_ask_price = price;
    }

    pub async fn seed_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.state
            .write()
            .await
            .candles
            .insert(symbol.to_string(), candles);
    }

    pub async fn seed_contract(&self, contract_id: &str, state: ContractState) {
        self.state
            .write()
            .await
            .contracts
            .insert(contract_id.to_string(), state);
    }

    /// Mutates a previously-seeded contract in place, e.g. to flip `is_sold`
    /// between polls in a settlement test (S4).
    pub async fn update_contract(&self, contract_id: &str, f: impl FnOnce(&mut ContractState)) {
        if let Some(state) = self.state.write().await.contracts.get_mut(contract_id) {
            f(state);
        }
    }

    pub async fn seed_profit_table(&self, entries: Vec<ProfitTableEntry>) {
        self.state.write().await.profit_table = ProfitTable {
            transactions: entries,
        };
    }

    pub async fn buy_calls(&self) -> Vec<(String, Decimal)> {
        self.state.read().await.buy_calls.clone()
    }

    pub async fn sell_calls(&self) -> Vec<(String, Decimal)> {
        self.state.read().await.sell_calls.clone()
    }

    pub async fn is_authorized(&self, token: &str) -> bool {
        self.state.read().await.authorized_tokens.contains(token)
    }
}

#[async_trait]
impl BrokerClient for MockBrokerClient {
    async fn authorize(&self, token: &str) -> Result<(), BrokerError> {
        let mut state = self.state.write().await;
        if state.reject_auth {
            return Err(BrokerError::Auth {
                token_suffix: token.chars().rev().take(4).collect(),
                reason: "mock broker configured to reject authorization".into(),
            });
        }
        state.authorized_tokens.insert(token.to_string());
        Ok(())
    }

    async fn ticks_history(
        &self,
        symbol: &str,
        start: i64,
        end: i64,
        count: u32,
    ) -> Result<Vec<Candle>, BrokerError> {
        let state = self.state.read().await;
        let candles = state
            .candles
            .get(symbol)
            .map(|c| {
                c.iter()
                    .filter(|c| c.ts >= start && c.ts < end)
                    .take(count as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(candles)
    }

    async fn contracts_for(&self, _symbol: &str) -> Result<Vec<String>, BrokerError> {
        Ok(vec!["MULTUP".to_string(), "MULTDOWN".to_string()])
    }

    async fn proposal(&self, _req: &ProposalRequest) -> Result<ProposalResponse, BrokerError> {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        Ok(ProposalResponse {
            proposal_id: format!("proposal-{id}"),
            ask_price: state.proposal_ask_price,
        })
    }

    async fn buy(&self, proposal_id: &str, price: Decimal) -> Result<String, BrokerError> {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        let contract_id = format!("contract-{id}");
        state.buy_calls.push((proposal_id.to_string(), price));
        state.contracts.insert(
            contract_id.clone(),
            ContractState {
                contract_id: contract_id.clone(),
                status: ContractStatus::Open,
                is_sold: false,
                buy_price: price,
                sell_price: None,
                sell_time: None,
                profit: None,
            },
        );
        Ok(contract_id)
    }

    async fn sell(&self, contract_id: &str, price: Decimal) -> Result<(), BrokerError> {
        let mut state = self.state.write().await;
        state.sell_calls.push((contract_id.to_string(), price));
        if let Some(contract) = state.contracts.get_mut(contract_id) {
            contract.is_sold = true;
            contract.status = ContractStatus::Sold;
            contract.sell_price = Some(price);
        }
        Ok(())
    }

    async fn open_contract(&self, contract_id: &str) -> Result<ContractState, BrokerError> {
        self.state
            .read()
            .await
            .contracts
            .get(contract_id)
            .cloned()
            .ok_or_else(|| BrokerError::Transient {
                reason: format!("mock broker has no contract {contract_id}"),
            })
    }

    async fn balance(&self) -> Result<Decimal, BrokerError> {
        Ok(self.state.read().await.balance)
    }

    async fn profit_table(&self, _from: i64, _to: i64) -> Result<ProfitTable, BrokerError> {
        Ok(self.state.read().await.profit_table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn authorize_rejects_when_configured() {
        let broker = MockBrokerClient::new();
        broker.set_reject_auth(true).await;
        assert!(broker.authorize("token").await.is_err());
    }

    #[tokio::test]
    async fn balance_reflects_seeded_value() {
        let broker = MockBrokerClient::new();
        broker.set_balance(dec!(1000)).await;
        assert_eq!(broker.balance().await.unwrap(), dec!(1000));
    }

    #[tokio::test]
    async fn buy_then_open_contract_round_trips_seeded_state() {
        let broker = MockBrokerClient::new();
        let contract_id = broker.buy("proposal-1", dec!(10)).await.unwrap();
        let state = broker.open_contract(&contract_id).await.unwrap();
        assert!(!state.is_sold);
        assert_eq!(state.buy_price, dec!(10));
    }

    #[tokio::test]
    async fn settlement_scenario_flips_contract_to_sold() {
        let broker = MockBrokerClient::new();
        broker
            .seed_contract(
                "X",
                ContractState {
                    contract_id: "X".into(),
                    status: ContractStatus::Open,
                    is_sold: false,
                    buy_price: dec!(10),
                    sell_price: None,
                    sell_time: None,
                    profit: None,
                },
            )
            .await;

        let before = broker.open_contract("X").await.unwrap();
        assert!(!before.is_sold);

        broker
            .update_contract("X", |c| {
                c.is_sold = true;
                c.status = ContractStatus::Sold;
                c.sell_price = Some(dec!(12.5));
                c.sell_time = Some(100);
                c.profit = Some(dec!(2.4));
            })
            .await;

        let after = broker.open_contract("X").await.unwrap();
        assert!(after.is_sold);
        assert_eq!(after.sell_price, Some(dec!(12.5)));
    }

    #[tokio::test]
    async fn ticks_history_filters_by_range_and_count() {
        let broker = MockBrokerClient::new();
        let candles = vec![
            Candle { symbol: "frxEURUSD".into(), ts: 0, open: dec!(1), high: dec!(1), low: dec!(1), close: dec!(1) },
            Candle { symbol: "frxEURUSD".into(), ts: 60, open: dec!(1), high: dec!(1), low: dec!(1), close: dec!(1) },
            Candle { symbol: "frxEURUSD".into(), ts: 120, open: dec!(1), high: dec!(1), low: dec!(1), close: dec!(1) },
        ];
        broker.seed_candles("frxEURUSD", candles).await;

        let result = broker
            .ticks_history("frxEURUSD", 0, 120, 10)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
    }
}
