//! Minimal ABI word codec for the staking contract.
//!
//! Every argument and return value the dashboard deals with is a single
//! 32-byte word (`uint256`, `address`, `bool`), so no dynamic encoding is
//! needed. Selectors are the first four bytes of the Keccak-256 hash of the
//! canonical signature.

use staker_types::{EthAddress, Wei};

use crate::ChainError;

/// One 32-byte ABI word.
pub type Word = [u8; 32];

/// `threshold()`
pub const THRESHOLD: [u8; 4] = [0x42, 0xcd, 0xe4, 0xe8];
/// `balances(address)`
pub const BALANCES: [u8; 4] = [0x27, 0xe2, 0x35, 0xe3];
/// `timeLeft()`
pub const TIME_LEFT: [u8; 4] = [0x13, 0x00, 0xa6, 0xd1];
/// `completed()` on the external contract.
pub const COMPLETED: [u8; 4] = [0x9d, 0x9a, 0x7f, 0xe9];
/// `exampleExternalContract()`
pub const EXTERNAL_CONTRACT: [u8; 4] = [0x9f, 0x75, 0xf2, 0x27];
/// `execute()`
pub const EXECUTE: [u8; 4] = [0x61, 0x46, 0x19, 0x54];
/// `withdraw()`
pub const WITHDRAW: [u8; 4] = [0x3c, 0xcf, 0xd6, 0x0b];
/// `stake()` (payable)
pub const STAKE: [u8; 4] = [0x3a, 0x4b, 0x66, 0xf1];

/// Topic 0 of `Stake(address,uint256)`.
pub const STAKE_EVENT_TOPIC: Word = [
    0xeb, 0xed, 0xb8, 0xb3, 0xc6, 0x78, 0x66, 0x6e,
    0x7f, 0x36, 0x97, 0x0b, 0xc8, 0xf5, 0x7a, 0xbf,
    0x6d, 0x8f, 0xa2, 0xe8, 0x28, 0xc0, 0xda, 0x91,
    0xea, 0x5b, 0x75, 0xbf, 0x68, 0xed, 0x10, 0x1a,
];

/// Calldata for `selector(args...)`.
pub fn encode_call(selector: [u8; 4], args: &[Word]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector);
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

pub fn address_word(address: &EthAddress) -> Word {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

pub fn uint_word(value: u128) -> Word {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn bool_word(value: bool) -> Word {
    uint_word(value as u128)
}

/// Split return data or log data into words.
pub fn decode_words(data: &[u8]) -> Result<Vec<Word>, ChainError> {
    if data.len() % 32 != 0 {
        return Err(ChainError::Decode(format!(
            "data length {} is not a multiple of 32",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

/// First word of `data`, required to exist.
pub fn first_word(data: &[u8]) -> Result<Word, ChainError> {
    decode_words(data)?
        .into_iter()
        .next()
        .ok_or_else(|| ChainError::Decode("empty return data".into()))
}

pub fn word_to_u128(word: &Word) -> Result<u128, ChainError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("uint256 value exceeds 128 bits".into()));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

pub fn word_to_u64(word: &Word) -> Result<u64, ChainError> {
    let value = word_to_u128(word)?;
    u64::try_from(value).map_err(|_| ChainError::Decode("uint256 value exceeds 64 bits".into()))
}

pub fn word_to_wei(word: &Word) -> Result<Wei, ChainError> {
    word_to_u128(word).map(Wei::new)
}

pub fn word_to_bool(word: &Word) -> Result<bool, ChainError> {
    match word_to_u128(word)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ChainError::Decode(format!("{other} is not a bool"))),
    }
}

pub fn word_to_address(word: &Word) -> Result<EthAddress, ChainError> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("address word has dirty high bytes".into()));
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Ok(EthAddress::new(bytes))
}
