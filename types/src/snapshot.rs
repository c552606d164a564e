//! Merged view of the staking contract at one moment.

use serde::{Deserialize, Serialize};

use crate::Wei;

/// The latest authoritative values of every independent chain source,
/// merged into one record.
///
/// Snapshots are replaced wholesale on every source update; nothing mutates
/// one in place. Once `is_complete` is set, `seconds_left` no longer matters
/// for action gating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSnapshot {
    /// Ledger balance held by the staking contract.
    pub total_staked: Wei,
    /// Funding goal that must be reached before execution.
    pub goal_threshold: Wei,
    /// Amount staked by the connected account.
    pub caller_stake: Wei,
    /// Seconds until the staking deadline, as reported by the contract.
    pub seconds_left: u64,
    /// Whether the external contract has been triggered.
    pub is_complete: bool,
}

impl StakeSnapshot {
    /// Whether the goal has been reached. A zero goal never counts as met.
    pub fn goal_met(&self) -> bool {
        !self.goal_threshold.is_zero() && self.total_staked >= self.goal_threshold
    }

    /// Whether the deadline is still in the future.
    pub fn deadline_open(&self) -> bool {
        self.seconds_left > 0
    }
}
