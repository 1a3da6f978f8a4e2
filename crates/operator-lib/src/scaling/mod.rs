//! Carbon-aware scaling of the queue worker deployment

mod controller;
mod gate;


pub use controller::{date_key, ScalingConfig, ScalingController};
pub use gate::{decide, needs_backlog, ReplicaBounds, ScaleTarget, ScaleThresholds};
