//! Application layer: pure computation (aggregator, strategies, risk sizer)
//! plus the long-running agents that wire them to the broker and store.

pub mod agents;
pub mod aggregator;
pub mod risk;
pub mod strategies;
pub mod system;
