use staker_chain::ChainError;
use staker_types::{StakerError, TxAction};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("config error: {0}")]
    Config(String),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("invalid value: {0}")]
    Value(#[from] StakerError),

    #[error("{action} is not allowed in the current contract state")]
    NotEligible { action: TxAction },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dashboard controller has stopped")]
    Closed,
}
