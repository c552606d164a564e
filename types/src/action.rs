//! User-initiated actions against the staking contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{StakerError, Wei};

/// The three writes the dashboard can submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxAction {
    Execute,
    Withdraw,
    Stake,
}

impl TxAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxAction::Execute => "execute",
            TxAction::Withdraw => "withdraw",
            TxAction::Stake => "stake",
        }
    }
}

impl fmt::Display for TxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single button press, consumed by the transaction orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TxRequest {
    Execute,
    Withdraw,
    Stake { value: Wei },
}

impl TxRequest {
    pub fn stake(preset: StakePreset) -> Self {
        TxRequest::Stake {
            value: preset.value(),
        }
    }

    pub fn action(&self) -> TxAction {
        match self {
            TxRequest::Execute => TxAction::Execute,
            TxRequest::Withdraw => TxAction::Withdraw,
            TxRequest::Stake { .. } => TxAction::Stake,
        }
    }

    /// Value attached to the call (zero for everything but stake).
    pub fn value(&self) -> Wei {
        match self {
            TxRequest::Stake { value } => *value,
            _ => Wei::ZERO,
        }
    }
}

/// The fixed stake amounts offered to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakePreset {
    #[serde(rename = "0.01")]
    Hundredth,
    #[default]
    #[serde(rename = "0.10")]
    Tenth,
    #[serde(rename = "1.00")]
    One,
}

impl StakePreset {
    pub const ALL: [StakePreset; 3] = [StakePreset::Hundredth, StakePreset::Tenth, StakePreset::One];

    pub fn label(&self) -> &'static str {
        match self {
            StakePreset::Hundredth => "0.01",
            StakePreset::Tenth => "0.10",
            StakePreset::One => "1.00",
        }
    }

    pub fn value(&self) -> Wei {
        match self {
            StakePreset::Hundredth => Wei::new(10_000_000_000_000_000),
            StakePreset::Tenth => Wei::new(100_000_000_000_000_000),
            StakePreset::One => Wei::ONE_ETHER,
        }
    }
}

impl FromStr for StakePreset {
    type Err = StakerError;

    /// Accepts any spelling that parses to one of the preset amounts,
    /// so `"0.1"` and `"0.10"` both select [`StakePreset::Tenth`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount =
            Wei::from_ether_str(s).map_err(|_| StakerError::UnknownPreset(s.to_string()))?;
        StakePreset::ALL
            .into_iter()
            .find(|p| p.value() == amount)
            .ok_or_else(|| StakerError::UnknownPreset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_labels_parse_back() {
        for preset in StakePreset::ALL {
            assert_eq!(preset.label().parse::<StakePreset>().unwrap(), preset);
        }
    }

    #[test]
    fn preset_accepts_short_spelling() {
        assert_eq!("0.1".parse::<StakePreset>().unwrap(), StakePreset::Tenth);
        assert_eq!("1".parse::<StakePreset>().unwrap(), StakePreset::One);
    }

    #[test]
    fn preset_rejects_other_amounts() {
        assert!(matches!(
            "0.5".parse::<StakePreset>(),
            Err(StakerError::UnknownPreset(_))
        ));
    }

    #[test]
    fn request_action_and_value() {
        let stake = TxRequest::stake(StakePreset::Tenth);
        assert_eq!(stake.action(), TxAction::Stake);
        assert_eq!(stake.value(), Wei::from_ether_str("0.1").unwrap());
        assert_eq!(TxRequest::Execute.value(), Wei::ZERO);
        assert_eq!(TxRequest::Withdraw.action(), TxAction::Withdraw);
    }

    #[test]
    fn request_serde_is_tagged() {
        let json = serde_json::to_value(TxRequest::Execute).unwrap();
        assert_eq!(json, serde_json::json!({ "action": "execute" }));
    }
}
