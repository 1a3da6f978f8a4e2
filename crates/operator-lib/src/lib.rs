//! Decision engine for the energy-aware operator
//!
//! This crate provides the core functionality for:
//! - Selecting low-carbon execution windows from grid intensity data
//! - Classifying solar node battery trends from Prometheus telemetry
//! - Steering deployments toward healthy solar nodes with node affinity
//! - Scaling the queue worker deployment around the optimal windows
//! - Persisting windows and decisions, health checks and observability

pub mod battery;
pub mod carbon;
pub mod cluster;
pub mod engine;
pub mod error;
pub mod health;
pub mod locks;
pub mod models;
pub mod observability;
pub mod placement;
pub mod queue;
pub mod scaling;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use engine::{ControlLoop, ControlLoopBuilder, EngineMode, LoopConfig};
pub use error::{OperatorError, Result};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthReport, Readiness};
pub use models::*;
pub use observability::{OperatorMetrics, StructuredLogger};
pub use store::{DecisionStore, EventStore, StoreError};
