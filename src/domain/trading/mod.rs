pub mod types;

pub use types::{
    BalanceSnapshot, ContractType, Risk, Signal, SignalKind, Trade, TradeStatus, User,
    UserSymbol, Window,
};
