//! Error types shared by the decision engine and its collaborators

use thiserror::Error;

use crate::store::StoreError;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Failure of one unit of work or of a whole pass
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("telemetry query failed: {0}")]
    Telemetry(String),

    #[error("queue lag query failed: {0}")]
    Queue(String),

    #[error("kubernetes API call failed: {0}")]
    Cluster(String),

    #[error("carbon intensity feed failed: {0}")]
    CarbonFeed(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl OperatorError {
    /// Health component the failure is attributed to
    pub fn component(&self) -> &'static str {
        use crate::health::components;

        match self {
            OperatorError::Telemetry(_) | OperatorError::MissingData(_) => components::TELEMETRY,
            OperatorError::Queue(_) => components::QUEUE,
            OperatorError::Cluster(_) => components::CLUSTER,
            OperatorError::CarbonFeed(_) => components::CARBON_FEED,
            OperatorError::Store(_) => components::STORE,
            OperatorError::InvalidInput(_) | OperatorError::Config(_) => components::ENGINE,
        }
    }
}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        OperatorError::Cluster(err.to_string())
    }
}
