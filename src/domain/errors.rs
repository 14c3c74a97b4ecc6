use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by `BrokerClient` operations.
#[derive(Debug, Error, Clone)]
pub enum BrokerError {
    #[error("broker authorization failed for token ending in {token_suffix}: {reason}")]
    Auth { token_suffix: String, reason: String },

    #[error("transient broker error: {reason}")]
    Transient { reason: String },

    #[error("proposal rejected ({code}): {msg}")]
    Proposal { code: String, msg: String },
}

impl BrokerError {
    pub fn is_auth(&self) -> bool {
        matches!(self, BrokerError::Auth { .. })
    }
}

/// Errors surfaced by Store reads/writes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store write failed on table {table}: {reason}")]
    Write { table: String, reason: String },

    #[error("store read failed on table {table}: {reason}")]
    Read { table: String, reason: String },

    #[error("symbol {symbol} is not a whitelisted candle table")]
    UnknownSymbol { symbol: String },
}

/// Logical/validation failures inside strategy evaluation. These are never
/// constructed for transient conditions — strategies only fail this way on
/// malformed input, which callers log and skip (§7).
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("insufficient candle history: need at least {need}, have {have}")]
    InsufficientHistory { need: usize, have: usize },

    #[error("degenerate risk geometry: entry {entry} equals stop-loss {sl}")]
    DegenerateRisk { entry: Decimal, sl: Decimal },
}

/// Errors from the eligibility evaluator's I/O (broker/store reads needed to
/// decide eligibility). A failure here does not imply ineligibility; callers
/// treat it as "unable to decide" and skip the iteration, never trading on
/// partial information.
#[derive(Debug, Error)]
pub enum EligibilityError {
    #[error("failed to read profit table for {email}: {reason}")]
    ProfitTableUnavailable { email: String, reason: String },

    #[error("no risk policy configured for {email}")]
    MissingRisk { email: String },
}

/// Errors from building or sending a proposal in the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("risk sizing produced non-positive amount for {email}/{symbol}")]
    NonPositiveSize { email: String, symbol: String },

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_error_formats_auth_reason() {
        let err = BrokerError::Auth {
            token_suffix: "abcd".into(),
            reason: "invalid token".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abcd"));
        assert!(msg.contains("invalid token"));
        assert!(err.is_auth());
    }

    #[test]
    fn proposal_error_carries_code_and_message() {
        let err = BrokerError::Proposal {
            code: "InvalidOfferings".into(),
            msg: "symbol closed".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("InvalidOfferings"));
        assert!(msg.contains("symbol closed"));
    }

    #[test]
    fn strategy_error_reports_degenerate_risk() {
        let err = StrategyError::DegenerateRisk {
            entry: Decimal::new(11000, 4),
            sl: Decimal::new(11000, 4),
        };
        assert!(err.to_string().contains("equals stop-loss"));
    }
}
