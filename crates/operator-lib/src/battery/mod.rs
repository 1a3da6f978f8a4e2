//! Solar node battery levels and trends

mod monitor;
mod trend;

pub use monitor::{BatteryMonitor, NODE_LABELS, UNKNOWN_NODE};
pub use trend::{adjusted_threshold, classify, TREND_DEADBAND};
