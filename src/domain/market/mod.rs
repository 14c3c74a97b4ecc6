pub mod candle;
pub mod indicators;
pub mod timeframe;

pub use candle::{AggregatedCandle, Candle};
pub use timeframe::Timeframe;
