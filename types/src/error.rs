//! Top-level error type for value parsing.

use thiserror::Error;

/// Errors produced while parsing or validating fundamental values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakerError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid ether amount: {0}")]
    InvalidAmount(String),

    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),

    #[error("unknown stake preset: {0}")]
    UnknownPreset(String),
}
