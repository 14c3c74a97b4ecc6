//! Core trading domain: entities, ports, repositories and error types.
//!
//! Everything here is pure or trait-only — no I/O, no broker or database
//! dependency. Infrastructure implements the ports and repositories defined
//! here; application wires the domain types into running tasks.

pub mod errors;
pub mod market;
pub mod ports;
pub mod repositories;
pub mod trading;
