//! Append-only, duplicate-free feed of `Stake` events.

use std::collections::HashSet;

use serde::Serialize;
use staker_types::{BlockNumber, EthAddress, StakeEvent, StakeEventKey, Wei};

/// Events in block order, arrival order within a block.
#[derive(Clone, Debug, Default)]
pub struct StakeHistory {
    events: Vec<StakeEvent>,
    seen: HashSet<StakeEventKey>,
}

impl StakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `event` unless its key was already seen. Returns whether it
    /// was added.
    pub fn insert(&mut self, event: StakeEvent) -> bool {
        if !self.seen.insert(event.key()) {
            return false;
        }
        let at = self
            .events
            .partition_point(|e| e.block_number <= event.block_number);
        self.events.insert(at, event);
        true
    }

    /// Insert every event, returning how many were new.
    pub fn extend(&mut self, events: impl IntoIterator<Item = StakeEvent>) -> usize {
        events.into_iter().filter(|e| self.insert(*e)).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[StakeEvent] {
        &self.events
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.events.iter().map(HistoryEntry::from).collect()
    }
}

/// One rendered row of the stake feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub from: EthAddress,
    pub from_short: String,
    pub amount: Wei,
    pub amount_ether: String,
    pub block_number: BlockNumber,
}

impl From<&StakeEvent> for HistoryEntry {
    fn from(event: &StakeEvent) -> Self {
        Self {
            from: event.depositor,
            from_short: event.depositor.short(),
            amount: event.amount,
            amount_ether: event.amount.format_ether(),
            block_number: event.block_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(who: u8, ether: u128, block: u64) -> StakeEvent {
        StakeEvent {
            depositor: EthAddress::new([who; 20]),
            amount: Wei::from_ether(ether),
            block_number: BlockNumber::new(block),
        }
    }

    #[test]
    fn repeated_delivery_is_deduplicated() {
        let mut history = StakeHistory::new();
        assert!(history.insert(event(1, 1, 5)));
        assert!(!history.insert(event(1, 1, 5)));
        assert_eq!(history.extend([event(1, 1, 5), event(2, 1, 5)]), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn ordered_by_block_then_arrival() {
        let mut history = StakeHistory::new();
        history.extend([event(1, 1, 9), event(2, 1, 3), event(3, 1, 9), event(4, 1, 5)]);
        let order: Vec<u8> = history
            .events()
            .iter()
            .map(|e| e.depositor.as_bytes()[0])
            .collect();
        assert_eq!(order, vec![2, 4, 1, 3]);
    }

    #[test]
    fn same_block_same_amount_collapses() {
        // Two genuine deposits that share the identity key count once.
        let mut history = StakeHistory::new();
        history.insert(event(7, 1, 4));
        history.insert(event(7, 1, 4));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn entries_render_ether_and_short_address() {
        let mut history = StakeHistory::new();
        history.insert(StakeEvent {
            depositor: EthAddress::new([0xab; 20]),
            amount: Wei::from_ether_str("0.1").unwrap(),
            block_number: BlockNumber::new(2),
        });
        let entries = history.entries();
        assert_eq!(entries[0].amount_ether, "0.1");
        assert_eq!(entries[0].from_short, EthAddress::new([0xab; 20]).short());
    }
}
