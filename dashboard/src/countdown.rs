//! Local deadline countdown.
//!
//! The contract's `timeLeft()` is authoritative but only read every few
//! seconds. Between reads the clock ticks down locally once per second.
//! A fresh authoritative value always replaces the local estimate, except
//! when it is a re-delivery of the value already applied or was observed at
//! an older block.

use serde::Serialize;
use staker_types::BlockNumber;
use staker_utils::{format_parts, humanize, DurationPart};

pub const HEADLINE_RUNNING: &str = "staking ends in";
pub const HEADLINE_ENDED: &str = "staking has ended";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownPhase {
    /// No authoritative value yet.
    #[default]
    Idle,
    Running,
    /// At zero or complete; ticks do nothing.
    Frozen,
}

/// The last authoritative value applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Authoritative {
    pub seconds: u64,
    pub observed_at: BlockNumber,
}

/// Result of offering an authoritative value to the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetOutcome {
    Applied,
    /// Same value and block as the last one applied.
    Duplicate,
    /// Observed before the last applied block.
    Stale,
}

#[derive(Clone, Debug, Default)]
pub struct CountdownClock {
    remaining: u64,
    last: Option<Authoritative>,
    complete: bool,
    phase: CountdownPhase,
}

impl CountdownClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_authoritative(&mut self, seconds: u64, observed_at: BlockNumber) -> ResetOutcome {
        if let Some(last) = self.last {
            if observed_at < last.observed_at {
                return ResetOutcome::Stale;
            }
            if observed_at == last.observed_at && seconds == last.seconds {
                return ResetOutcome::Duplicate;
            }
        }
        self.last = Some(Authoritative { seconds, observed_at });
        self.remaining = seconds;
        self.phase = if self.complete || seconds == 0 {
            CountdownPhase::Frozen
        } else {
            CountdownPhase::Running
        };
        ResetOutcome::Applied
    }

    /// Record the completion flag. Completion freezes the clock.
    pub fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
        if complete {
            self.phase = CountdownPhase::Frozen;
        }
    }

    /// Advance one second. Returns the remaining seconds.
    pub fn tick(&mut self) -> u64 {
        if self.phase == CountdownPhase::Running {
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                self.phase = CountdownPhase::Frozen;
            }
        }
        self.remaining
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn last_authoritative(&self) -> Option<Authoritative> {
        self.last
    }

    /// The local estimate has reached zero after an authoritative start.
    pub fn locally_expired(&self) -> bool {
        self.last.is_some() && self.remaining == 0
    }

    pub fn view(&self) -> CountdownView {
        let parts = humanize(self.remaining);
        CountdownView {
            phase: self.phase,
            remaining_seconds: self.remaining,
            text: format_parts(&parts),
            parts,
            headline: if self.complete {
                HEADLINE_ENDED
            } else {
                HEADLINE_RUNNING
            },
        }
    }
}

/// Render-ready countdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CountdownView {
    pub phase: CountdownPhase,
    pub remaining_seconds: u64,
    pub parts: Vec<DurationPart>,
    pub text: String,
    pub headline: &'static str,
}
