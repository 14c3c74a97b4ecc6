pub mod broker;
pub mod observability;
pub mod persistence;
