//! Persistence of computed windows and the decision audit log
//!
//! `DecisionStore` is the seam the controllers write through; `EventStore`
//! implements it on top of redb.

mod event_store;
mod tables;

pub use event_store::EventStore;

use crate::models::{PlacementEvent, ScalingDecision, ScalingEvent, Window};
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("store used after close")]
    Closed,
}

impl StoreError {
    /// Misuse of the handle rather than an I/O problem
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Closed)
    }
}

/// Window cache and append-only decision log
pub trait DecisionStore: Send + Sync {
    /// Windows stored for `date`, if any
    fn get_windows(&self, date: &str) -> StoreResult<Option<Vec<Window>>>;

    /// Overwrite the windows stored for `date`
    fn put_windows(&self, date: &str, windows: &[Window]) -> StoreResult<()>;

    /// Append a scaling decision, returning its sequence id
    fn append_event(&self, decision: &ScalingDecision) -> StoreResult<u64>;

    /// Up to `limit` scaling events, newest first
    fn recent_events(&self, limit: usize) -> StoreResult<Vec<ScalingEvent>>;

    /// Append a placement event, returning its sequence id
    fn append_placement(&self, event: &PlacementEvent) -> StoreResult<u64>;

    /// Up to `limit` placement events, newest first
    fn recent_placements(&self, limit: usize) -> StoreResult<Vec<PlacementEvent>>;
}
