//! BrokerClient (C1) adapters: `WsBrokerClient` is the production session
//! over a persistent WebSocket; `mock` backs tests with in-memory state.

pub mod mock;
pub mod ws_client;

pub use mock::MockBrokerClient;
pub use ws_client::{WsBrokerClient, WsBrokerClientFactory};
