//! Streaming protocol decoding: frame parser and tool-call aggregation.

pub mod aggregator;
pub mod parser;

pub use aggregator::ToolCallAggregator;
pub use parser::{parse, TurnAccumulator};
