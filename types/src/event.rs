//! Stake events streamed from the contract's logs.

use serde::{Deserialize, Serialize};

use crate::{BlockNumber, EthAddress, Wei};

/// One `Stake(address,uint256)` log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEvent {
    pub depositor: EthAddress,
    pub amount: Wei,
    pub block_number: BlockNumber,
}

/// Identity used to deduplicate repeated log deliveries.
///
/// Two distinct deposits of the same amount by the same address in the same
/// block share a key and collapse into one history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StakeEventKey {
    pub depositor: EthAddress,
    pub amount: Wei,
    pub block_number: BlockNumber,
}

impl StakeEvent {
    pub fn key(&self) -> StakeEventKey {
        StakeEventKey {
            depositor: self.depositor,
            amount: self.amount,
            block_number: self.block_number,
        }
    }
}
