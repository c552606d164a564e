//! Chain value sources.
//!
//! A source is one background task re-issuing one query against the ledger
//! on a [`RefreshTrigger`]. Every cycle reads the head block first and pins
//! the query to it, so each delivered value carries the exact block it
//! describes. Results flow to the controller over an mpsc channel; nothing
//! is shared.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use staker_chain::{ChainError, LedgerReader};
use staker_types::{BlockNumber, StakeEvent, Wei};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// When a source re-reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Re-read on a fixed cadence.
    Every(Duration),
    /// Check the head every `poll` and re-read only when it advanced.
    NewBlock { poll: Duration },
}

impl RefreshTrigger {
    fn period(&self) -> Duration {
        match self {
            RefreshTrigger::Every(period) => *period,
            RefreshTrigger::NewBlock { poll } => *poll,
        }
    }
}

/// The independent values the dashboard reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Ledger balance of the staking contract.
    TotalStaked,
    /// `threshold()`
    GoalThreshold,
    /// `balances(caller)`
    CallerStake,
    /// `timeLeft()`
    SecondsLeft,
    /// `completed()` on the external contract.
    Completion,
    /// `Stake` logs.
    StakeEvents,
    /// Ledger balance of the external contract.
    ExternalBalance,
}

impl SourceKind {
    pub const ALL: [SourceKind; 7] = [
        SourceKind::TotalStaked,
        SourceKind::GoalThreshold,
        SourceKind::CallerStake,
        SourceKind::SecondsLeft,
        SourceKind::Completion,
        SourceKind::StakeEvents,
        SourceKind::ExternalBalance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::TotalStaked => "total_staked",
            SourceKind::GoalThreshold => "goal_threshold",
            SourceKind::CallerStake => "caller_stake",
            SourceKind::SecondsLeft => "seconds_left",
            SourceKind::Completion => "completion",
            SourceKind::StakeEvents => "stake_events",
            SourceKind::ExternalBalance => "external_balance",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved source value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceValue {
    Amount(Wei),
    Seconds(u64),
    Flag(bool),
    /// Events found since the previous delivery.
    Events(Vec<StakeEvent>),
}

/// What a source reports to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceEvent {
    Value {
        kind: SourceKind,
        value: SourceValue,
        observed_at: BlockNumber,
    },
    Failed {
        kind: SourceKind,
        error: ChainError,
    },
}

impl SourceEvent {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceEvent::Value { kind, .. } | SourceEvent::Failed { kind, .. } => *kind,
        }
    }
}

/// Admits block numbers in non-decreasing order only.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicGate {
    last: Option<BlockNumber>,
}

impl MonotonicGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and records `at` unless an older block than the last
    /// admitted one.
    pub fn admit(&mut self, at: BlockNumber) -> bool {
        match self.last {
            Some(last) if at < last => false,
            _ => {
                self.last = Some(at);
                true
            }
        }
    }

    pub fn last(&self) -> Option<BlockNumber> {
        self.last
    }
}

/// One query a source re-issues every cycle.
pub trait ValueQuery: Send + 'static {
    fn kind(&self) -> SourceKind;

    /// Read the value as of block `at`.
    fn fetch<R: LedgerReader>(
        &mut self,
        reader: &R,
        at: BlockNumber,
    ) -> impl Future<Output = Result<SourceValue, ChainError>> + Send;
}

/// Owns a running source task. Dropping the handle cancels the task.
pub struct SourceHandle {
    kind: SourceKind,
    task: JoinHandle<()>,
}

impl SourceHandle {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Stop the source. No further reads are issued.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a background task running `query` on `trigger` until shutdown, the
/// handle is dropped, or the controller stops listening.
pub fn spawn_source<Q, R>(
    mut query: Q,
    trigger: RefreshTrigger,
    reader: Arc<R>,
    events: mpsc::Sender<SourceEvent>,
    mut shutdown: broadcast::Receiver<()>,
) -> SourceHandle
where
    Q: ValueQuery,
    R: LedgerReader + 'static,
{
    let kind = query.kind();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(trigger.period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut gate = MonotonicGate::new();
        let mut last_head: Option<BlockNumber> = None;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = interval.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                outcome = refresh(&mut query, reader.as_ref(), trigger, last_head) => outcome,
            };

            let event = match outcome {
                Refresh::Unchanged => continue,
                Refresh::Read { value, observed_at } => {
                    last_head = Some(observed_at);
                    if !gate.admit(observed_at) {
                        tracing::debug!(source = %kind, block = %observed_at, "dropping out-of-order read");
                        continue;
                    }
                    SourceEvent::Value {
                        kind,
                        value,
                        observed_at,
                    }
                }
                Refresh::Failed(error) => {
                    tracing::warn!(source = %kind, error = %error, "chain read failed");
                    SourceEvent::Failed { kind, error }
                }
            };

            if events.send(event).await.is_err() {
                tracing::debug!(source = %kind, "controller gone, stopping source");
                break;
            }
        }
    });
    SourceHandle { kind, task }
}

enum Refresh {
    Unchanged,
    Read {
        value: SourceValue,
        observed_at: BlockNumber,
    },
    Failed(ChainError),
}

async fn refresh<Q: ValueQuery, R: LedgerReader>(
    query: &mut Q,
    reader: &R,
    trigger: RefreshTrigger,
    last_head: Option<BlockNumber>,
) -> Refresh {
    let head = match reader.block_number().await {
        Ok(head) => head,
        Err(error) => return Refresh::Failed(error),
    };
    if matches!(trigger, RefreshTrigger::NewBlock { .. }) && last_head == Some(head) {
        return Refresh::Unchanged;
    }
    match query.fetch(reader, head).await {
        Ok(value) => Refresh::Read {
            value,
            observed_at: head,
        },
        Err(error) => Refresh::Failed(error),
    }
}
