//! Nullable infrastructure for deterministic testing.
//!
//! The dashboard reaches the chain only through the `LedgerReader` and
//! `TxSigner` traits. [`NullLedger`] implements both in memory:
//! - answers reads from scripted state or a simulated staking contract
//! - records every transaction instead of broadcasting it
//! - can be told to fail, revert or hold receipts
//!
//! Usage: hand a `NullLedger` clone to the code under test and keep another
//! for scripting and assertions.

pub mod ledger;

pub use ledger::{Mining, NullLedger, StakerFixture};
