//! Native-currency amounts in wei.
//!
//! Amounts are fixed-point integers (u128) to avoid floating-point errors.
//! One ether is 10^18 wei.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::StakerError;

/// Number of fractional decimal digits in one ether.
pub const ETHER_DECIMALS: u32 = 18;

/// An amount of the native currency, stored as raw wei.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Wei(u128);

impl Wei {
    pub const ZERO: Self = Self(0);
    pub const ONE_ETHER: Self = Self(1_000_000_000_000_000_000);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Whole ether units.
    pub fn from_ether(units: u128) -> Self {
        Self(units * Self::ONE_ETHER.0)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Parse a decimal ether string such as `"0.1"` or `"1.00"`.
    ///
    /// At most 18 fractional digits are accepted; anything finer than one
    /// wei is rejected rather than rounded.
    pub fn from_ether_str(s: &str) -> Result<Self, StakerError> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(StakerError::InvalidAmount(s.to_string()));
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(StakerError::InvalidAmount(s.to_string()));
        }
        if frac.len() > ETHER_DECIMALS as usize {
            return Err(StakerError::InvalidAmount(format!(
                "{s}: more than {ETHER_DECIMALS} fractional digits"
            )));
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| StakerError::InvalidAmount(s.to_string()))?
        };
        let frac_wei: u128 = if frac.is_empty() {
            0
        } else {
            let scale = 10u128.pow(ETHER_DECIMALS - frac.len() as u32);
            frac.parse::<u128>()
                .map_err(|_| StakerError::InvalidAmount(s.to_string()))?
                * scale
        };

        whole
            .checked_mul(Self::ONE_ETHER.0)
            .and_then(|w| w.checked_add(frac_wei))
            .map(Self)
            .ok_or_else(|| StakerError::InvalidAmount(format!("{s}: overflow")))
    }

    /// Render as decimal ether with trailing zeros trimmed (`"0.1"`, `"5.0"`).
    pub fn format_ether(&self) -> String {
        let whole = self.0 / Self::ONE_ETHER.0;
        let frac = self.0 % Self::ONE_ETHER.0;
        let mut frac = format!("{:018}", frac);
        while frac.len() > 1 && frac.ends_with('0') {
            frac.pop();
        }
        format!("{whole}.{frac}")
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.format_ether())
    }
}
