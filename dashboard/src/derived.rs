//! Pure derivations from the merged snapshot.
//!
//! Every rule here is biased towards disabling: the dashboard may withhold an
//! action the contract would accept, never offer one it would reject.

use serde::Serialize;
use staker_types::{StakeSnapshot, TxAction};

use crate::history::{HistoryEntry, StakeHistory};

/// Which actions the user may currently trigger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ActionEligibility {
    pub can_execute: bool,
    pub can_withdraw: bool,
    pub can_stake: bool,
}

impl ActionEligibility {
    pub const NONE: Self = Self {
        can_execute: false,
        can_withdraw: false,
        can_stake: false,
    };

    pub fn permits(&self, action: TxAction) -> bool {
        match action {
            TxAction::Execute => self.can_execute,
            TxAction::Withdraw => self.can_withdraw,
            TxAction::Stake => self.can_stake,
        }
    }

    /// Clear the actions that need the deadline still open. Applied once the
    /// local countdown has run out, ahead of the next authoritative read.
    pub fn mask_local_deadline(self) -> Self {
        Self {
            can_execute: false,
            can_stake: false,
            ..self
        }
    }
}

/// Funding progress, 0 to 100. A zero goal yields 0.
pub fn progress_percent(snapshot: &StakeSnapshot) -> u8 {
    if snapshot.is_complete {
        return 100;
    }
    let total = snapshot.total_staked.raw();
    let goal = snapshot.goal_threshold.raw();
    if goal == 0 {
        return 0;
    }
    if total >= goal {
        return 100;
    }
    // total < goal here, so the quotient is below 100.
    let percent = match total.checked_mul(100) {
        Some(scaled) => scaled / goal,
        None => total / (goal / 100),
    };
    percent.min(99) as u8
}

pub fn eligibility(snapshot: Option<&StakeSnapshot>) -> ActionEligibility {
    let Some(s) = snapshot else {
        return ActionEligibility::NONE;
    };
    let open = !s.is_complete;
    ActionEligibility {
        can_execute: open && s.goal_met() && s.deadline_open(),
        can_withdraw: open && !s.deadline_open() && !s.caller_stake.is_zero(),
        can_stake: open && s.deadline_open(),
    }
}

/// Everything the UI derives from one snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DerivedState {
    pub progress_percent: u8,
    pub eligibility: ActionEligibility,
    pub formatted_history: Vec<HistoryEntry>,
}

pub fn compute(snapshot: Option<&StakeSnapshot>, history: &StakeHistory) -> DerivedState {
    DerivedState {
        progress_percent: snapshot.map(progress_percent).unwrap_or(0),
        eligibility: eligibility(snapshot),
        formatted_history: history.entries(),
    }
}
