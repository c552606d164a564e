//! Abstract seams to the remote ledger.
//!
//! The dashboard never talks to a transport directly: reads go through
//! [`LedgerReader`] and writes through [`TxSigner`]. The JSON-RPC client
//! implements both; tests substitute a scripted in-memory ledger.

use std::future::Future;

use serde::{Deserialize, Serialize};
use staker_types::{BlockNumber, EthAddress, TxHash, Wei};

use crate::ChainError;

/// A read-only contract call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRequest {
    pub to: EthAddress,
    pub data: Vec<u8>,
}

/// Filter for a log query over an inclusive block range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFilter {
    pub address: EthAddress,
    pub topic0: [u8; 32],
    pub from_block: BlockNumber,
    pub to_block: BlockNumber,
}

/// A log row as returned by the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLog {
    pub address: EthAddress,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
    pub block_number: BlockNumber,
    pub log_index: u64,
}

/// A state-changing call to be signed and sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteCall {
    pub to: EthAddress,
    pub data: Vec<u8>,
    pub value: Wei,
}

/// Outcome of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: BlockNumber,
    /// `false` when the transaction was mined but reverted.
    pub success: bool,
    pub gas_used: u64,
}

/// Read access to the ledger. Every read is pinned to an explicit block so
/// that results can be ordered by the block they describe.
pub trait LedgerReader: Send + Sync {
    /// Current head block.
    fn block_number(&self) -> impl Future<Output = Result<BlockNumber, ChainError>> + Send;

    /// Native balance of `address` at block `at`.
    fn balance(
        &self,
        address: &EthAddress,
        at: BlockNumber,
    ) -> impl Future<Output = Result<Wei, ChainError>> + Send;

    /// Execute a read-only call at block `at` and return the raw result.
    fn call(
        &self,
        request: &CallRequest,
        at: BlockNumber,
    ) -> impl Future<Output = Result<Vec<u8>, ChainError>> + Send;

    /// Logs matching `filter`.
    fn logs(&self, filter: &LogFilter) -> impl Future<Output = Result<Vec<RawLog>, ChainError>> + Send;
}

/// Write access through an external signing provider.
pub trait TxSigner: Send + Sync {
    /// Sign and broadcast `call`, returning its hash once accepted.
    fn send_transaction(&self, call: &WriteCall) -> impl Future<Output = Result<TxHash, ChainError>> + Send;

    /// Receipt for `hash`, or `None` while it is still pending.
    fn transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> impl Future<Output = Result<Option<TxReceipt>, ChainError>> + Send;
}
