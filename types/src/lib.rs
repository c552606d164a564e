//! Fundamental types for the staker dashboard.
//!
//! This crate defines the value types shared across every other crate in the
//! workspace: addresses, wei amounts, block numbers, transaction hashes, the
//! merged stake snapshot, stake events and user transaction requests.

pub mod action;
pub mod address;
pub mod amount;
pub mod block;
pub mod error;
pub mod event;
pub mod hash;
pub mod snapshot;

pub use action::{StakePreset, TxAction, TxRequest};
pub use address::EthAddress;
pub use amount::Wei;
pub use block::BlockNumber;
pub use error::StakerError;
pub use event::{StakeEvent, StakeEventKey};
pub use hash::TxHash;
pub use snapshot::StakeSnapshot;
