//! Remote ledger access for the staker dashboard.
//!
//! - [`client`]: the [`LedgerReader`] and [`TxSigner`] seams every other
//!   crate talks to, plus the request/response shapes they exchange.
//! - [`jsonrpc`]: an HTTP JSON-RPC implementation of both seams.
//! - [`abi`]: 32-byte word encoding for calls, results and logs.
//! - [`staker`]: a typed binding for the staking contract's getters, writes
//!   and `Stake` events.

pub mod abi;
pub mod client;
pub mod error;
pub mod jsonrpc;
pub mod staker;

pub use client::{CallRequest, LedgerReader, LogFilter, RawLog, TxReceipt, TxSigner, WriteCall};
pub use error::ChainError;
pub use jsonrpc::JsonRpcClient;
pub use staker::StakerContract;
