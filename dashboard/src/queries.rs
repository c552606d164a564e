//! The staking contract's source queries and a one-shot status read.

use serde::Serialize;
use staker_chain::{ChainError, LedgerReader, StakerContract};
use staker_types::{BlockNumber, EthAddress, StakeSnapshot, Wei};

use crate::derived::{self, DerivedState};
use crate::history::StakeHistory;
use crate::source::{SourceKind, SourceValue, ValueQuery};
use crate::DashboardError;

/// Trailing blocks the event query scans again on its next cycle. The node
/// answering `eth_getLogs` may lag the one that reported the head; history
/// dedup absorbs the repeats.
pub const EVENT_RESCAN_BLOCKS: u64 = 2;

/// One [`SourceKind`] bound to the staking contract.
///
/// The event query keeps a cursor so each cycle only asks for blocks it has
/// not yet scanned, plus the last [`EVENT_RESCAN_BLOCKS`].
#[derive(Clone, Debug)]
pub struct StakerQuery {
    kind: SourceKind,
    contract: StakerContract,
    caller: Option<EthAddress>,
    cursor: BlockNumber,
}

impl StakerQuery {
    pub fn new(
        kind: SourceKind,
        contract: StakerContract,
        caller: Option<EthAddress>,
        event_start: BlockNumber,
    ) -> Self {
        Self {
            kind,
            contract,
            caller,
            cursor: event_start,
        }
    }

    /// Next block the event query will scan from.
    pub fn cursor(&self) -> BlockNumber {
        self.cursor
    }
}

impl ValueQuery for StakerQuery {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch<R: LedgerReader>(
        &mut self,
        reader: &R,
        at: BlockNumber,
    ) -> Result<SourceValue, ChainError> {
        let contract = self.contract;
        let value = match self.kind {
            SourceKind::TotalStaked => SourceValue::Amount(contract.total_staked(reader, at).await?),
            SourceKind::GoalThreshold => SourceValue::Amount(contract.threshold(reader, at).await?),
            SourceKind::CallerStake => match self.caller {
                Some(caller) => SourceValue::Amount(contract.stake_of(reader, &caller, at).await?),
                // Without an account nothing is staked by the caller.
                None => SourceValue::Amount(Wei::ZERO),
            },
            SourceKind::SecondsLeft => SourceValue::Seconds(contract.time_left(reader, at).await?),
            SourceKind::Completion => SourceValue::Flag(contract.completed(reader, at).await?),
            SourceKind::ExternalBalance => {
                SourceValue::Amount(contract.external_balance(reader, at).await?)
            }
            SourceKind::StakeEvents => {
                if self.cursor > at {
                    return Ok(SourceValue::Events(Vec::new()));
                }
                let events = contract.stake_events(reader, self.cursor, at).await?;
                let rescan_from = at.next().as_u64().saturating_sub(EVENT_RESCAN_BLOCKS);
                self.cursor = self.cursor.max(BlockNumber::new(rescan_from));
                SourceValue::Events(events)
            }
        };
        Ok(value)
    }
}

/// Every value read once, pinned to a single block.
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub observed_at: BlockNumber,
    pub contract: EthAddress,
    pub external: EthAddress,
    pub snapshot: StakeSnapshot,
    pub external_balance: Wei,
    pub derived: DerivedState,
}

/// Read the whole dashboard state once, without spawning sources.
pub async fn read_status_once<R: LedgerReader>(
    reader: &R,
    contract: StakerContract,
    caller: Option<EthAddress>,
    from_block: BlockNumber,
) -> Result<StatusReport, DashboardError> {
    let at = reader.block_number().await?;
    let caller_stake = match caller {
        Some(caller) => contract.stake_of(reader, &caller, at).await?,
        None => Wei::ZERO,
    };
    let snapshot = StakeSnapshot {
        total_staked: contract.total_staked(reader, at).await?,
        goal_threshold: contract.threshold(reader, at).await?,
        caller_stake,
        seconds_left: contract.time_left(reader, at).await?,
        is_complete: contract.completed(reader, at).await?,
    };
    let external_balance = contract.external_balance(reader, at).await?;

    let mut history = StakeHistory::new();
    if from_block <= at {
        history.extend(contract.stake_events(reader, from_block, at).await?);
    }
    tracing::debug!(block = %at, events = history.len(), "status read");

    Ok(StatusReport {
        observed_at: at,
        contract: contract.address,
        external: contract.external,
        snapshot,
        external_balance,
        derived: derived::compute(Some(&snapshot), &history),
    })
}
