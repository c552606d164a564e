//! Typed binding for the staking contract and its external target.

use staker_types::{BlockNumber, EthAddress, StakeEvent, TxRequest, Wei};

use crate::abi;
use crate::client::{CallRequest, LedgerReader, LogFilter, RawLog, WriteCall};
use crate::ChainError;

/// Addresses of the staking contract and the external contract it triggers
/// on execution. Holds no connection; every read takes the reader and the
/// block to pin the read to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakerContract {
    pub address: EthAddress,
    pub external: EthAddress,
}

impl StakerContract {
    pub fn new(address: EthAddress, external: EthAddress) -> Self {
        Self { address, external }
    }

    /// Look up the external contract through the staker's
    /// `exampleExternalContract()` getter.
    pub async fn resolve<R: LedgerReader>(reader: &R, address: EthAddress) -> Result<Self, ChainError> {
        let at = reader.block_number().await?;
        let request = CallRequest {
            to: address,
            data: abi::encode_call(abi::EXTERNAL_CONTRACT, &[]),
        };
        let word = abi::first_word(&reader.call(&request, at).await?)?;
        let external = abi::word_to_address(&word)?;
        tracing::debug!(staker = %address, %external, "resolved external contract");
        Ok(Self { address, external })
    }

    async fn read_word<R: LedgerReader>(
        &self,
        reader: &R,
        to: EthAddress,
        data: Vec<u8>,
        at: BlockNumber,
    ) -> Result<abi::Word, ChainError> {
        let result = reader.call(&CallRequest { to, data }, at).await?;
        abi::first_word(&result)
    }

    /// `threshold()`: the funding goal.
    pub async fn threshold<R: LedgerReader>(&self, reader: &R, at: BlockNumber) -> Result<Wei, ChainError> {
        let data = abi::encode_call(abi::THRESHOLD, &[]);
        abi::word_to_wei(&self.read_word(reader, self.address, data, at).await?)
    }

    /// `balances(who)`: the amount `who` has staked.
    pub async fn stake_of<R: LedgerReader>(
        &self,
        reader: &R,
        who: &EthAddress,
        at: BlockNumber,
    ) -> Result<Wei, ChainError> {
        let data = abi::encode_call(abi::BALANCES, &[abi::address_word(who)]);
        abi::word_to_wei(&self.read_word(reader, self.address, data, at).await?)
    }

    /// `timeLeft()`: seconds until the deadline, zero once it has passed.
    pub async fn time_left<R: LedgerReader>(&self, reader: &R, at: BlockNumber) -> Result<u64, ChainError> {
        let data = abi::encode_call(abi::TIME_LEFT, &[]);
        abi::word_to_u64(&self.read_word(reader, self.address, data, at).await?)
    }

    /// `completed()` on the external contract.
    pub async fn completed<R: LedgerReader>(&self, reader: &R, at: BlockNumber) -> Result<bool, ChainError> {
        let data = abi::encode_call(abi::COMPLETED, &[]);
        abi::word_to_bool(&self.read_word(reader, self.external, data, at).await?)
    }

    /// Ledger balance of the staking contract, i.e. everything staked so far.
    pub async fn total_staked<R: LedgerReader>(&self, reader: &R, at: BlockNumber) -> Result<Wei, ChainError> {
        reader.balance(&self.address, at).await
    }

    /// Ledger balance of the external contract.
    pub async fn external_balance<R: LedgerReader>(
        &self,
        reader: &R,
        at: BlockNumber,
    ) -> Result<Wei, ChainError> {
        reader.balance(&self.external, at).await
    }

    /// `Stake` events emitted in `from..=to`, in block then log order.
    pub async fn stake_events<R: LedgerReader>(
        &self,
        reader: &R,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<StakeEvent>, ChainError> {
        let filter = LogFilter {
            address: self.address,
            topic0: abi::STAKE_EVENT_TOPIC,
            from_block: from,
            to_block: to,
        };
        let mut logs = reader.logs(&filter).await?;
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        logs.iter().map(decode_stake_event).collect()
    }

    /// The write call that carries out `request`.
    pub fn write_call(&self, request: &TxRequest) -> WriteCall {
        let selector = match request {
            TxRequest::Execute => abi::EXECUTE,
            TxRequest::Withdraw => abi::WITHDRAW,
            TxRequest::Stake { .. } => abi::STAKE,
        };
        WriteCall {
            to: self.address,
            data: abi::encode_call(selector, &[]),
            value: request.value(),
        }
    }
}

/// Decode a `Stake(address,uint256)` log.
///
/// Handles both the plain form (depositor and amount in data) and an
/// indexed-depositor form (depositor in topic 1, amount in data).
pub fn decode_stake_event(log: &RawLog) -> Result<StakeEvent, ChainError> {
    if log.topics.first() != Some(&abi::STAKE_EVENT_TOPIC) {
        return Err(ChainError::Decode("log is not a Stake event".into()));
    }
    let words = abi::decode_words(&log.data)?;
    let (depositor, amount) = match (log.topics.get(1), words.as_slice()) {
        (Some(topic), [amount, ..]) => (abi::word_to_address(topic)?, abi::word_to_wei(amount)?),
        (None, [depositor, amount, ..]) => {
            (abi::word_to_address(depositor)?, abi::word_to_wei(amount)?)
        }
        _ => {
            return Err(ChainError::Decode(format!(
                "Stake event with {} data words",
                words.len()
            )))
        }
    };
    Ok(StakeEvent {
        depositor,
        amount,
        block_number: log.block_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stake_log(depositor: EthAddress, amount: Wei, block: u64) -> RawLog {
        let mut data = abi::address_word(&depositor).to_vec();
        data.extend_from_slice(&abi::uint_word(amount.raw()));
        RawLog {
            address: EthAddress::new([9; 20]),
            topics: vec![abi::STAKE_EVENT_TOPIC],
            data,
            block_number: BlockNumber::new(block),
            log_index: 0,
        }
    }

    #[test]
    fn decodes_plain_stake_log() {
        let who = EthAddress::new([7; 20]);
        let event = decode_stake_event(&stake_log(who, Wei::ONE_ETHER, 12)).unwrap();
        assert_eq!(event.depositor, who);
        assert_eq!(event.amount, Wei::ONE_ETHER);
        assert_eq!(event.block_number, BlockNumber::new(12));
    }

    #[test]
    fn decodes_indexed_depositor() {
        let who = EthAddress::new([3; 20]);
        let log = RawLog {
            address: EthAddress::new([9; 20]),
            topics: vec![abi::STAKE_EVENT_TOPIC, abi::address_word(&who)],
            data: abi::uint_word(42).to_vec(),
            block_number: BlockNumber::new(1),
            log_index: 2,
        };
        let event = decode_stake_event(&log).unwrap();
        assert_eq!(event.depositor, who);
        assert_eq!(event.amount, Wei::new(42));
    }

    #[test]
    fn rejects_foreign_topic() {
        let mut log = stake_log(EthAddress::ZERO, Wei::ZERO, 1);
        log.topics[0] = [0u8; 32];
        assert!(decode_stake_event(&log).is_err());
    }

    #[test]
    fn write_calls_carry_value_only_for_stake() {
        let contract = StakerContract::new(EthAddress::new([1; 20]), EthAddress::new([2; 20]));
        let stake = contract.write_call(&TxRequest::Stake { value: Wei::ONE_ETHER });
        assert_eq!(stake.data, abi::STAKE.to_vec());
        assert_eq!(stake.value, Wei::ONE_ETHER);
        assert_eq!(stake.to, contract.address);

        let execute = contract.write_call(&TxRequest::Execute);
        assert_eq!(execute.data, abi::EXECUTE.to_vec());
        assert!(execute.value.is_zero());

        let withdraw = contract.write_call(&TxRequest::Withdraw);
        assert_eq!(withdraw.data, abi::WITHDRAW.to_vec());
    }
}
