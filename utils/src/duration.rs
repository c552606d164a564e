//! Humanized duration breakdown for the deadline countdown.
//!
//! Seconds are split greedily over a fixed unit ladder, largest unit first.
//! Years and months use the average Gregorian lengths (365.25 days and
//! 30.4375 days), both whole numbers of seconds.

use serde::Serialize;
use std::fmt;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const MONTH: u64 = 2_629_800;
const YEAR: u64 = 31_557_600;

/// One rung of the ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl DurationUnit {
    /// The ladder, largest unit first.
    pub const LADDER: [DurationUnit; 6] = [
        DurationUnit::Year,
        DurationUnit::Month,
        DurationUnit::Day,
        DurationUnit::Hour,
        DurationUnit::Minute,
        DurationUnit::Second,
    ];

    pub fn seconds(&self) -> u64 {
        match self {
            DurationUnit::Year => YEAR,
            DurationUnit::Month => MONTH,
            DurationUnit::Day => DAY,
            DurationUnit::Hour => HOUR,
            DurationUnit::Minute => MINUTE,
            DurationUnit::Second => 1,
        }
    }

    fn singular(&self) -> &'static str {
        match self {
            DurationUnit::Year => "year",
            DurationUnit::Month => "month",
            DurationUnit::Day => "day",
            DurationUnit::Hour => "hour",
            DurationUnit::Minute => "minute",
            DurationUnit::Second => "second",
        }
    }

    /// Label agreeing in number with `value` (`"day"` / `"days"`).
    pub fn label(&self, value: u64) -> String {
        if value == 1 {
            self.singular().to_string()
        } else {
            format!("{}s", self.singular())
        }
    }
}

/// A non-zero amount of one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DurationPart {
    pub value: u64,
    pub unit: DurationUnit,
}

impl fmt::Display for DurationPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.label(self.value))
    }
}

/// Break `secs` into non-zero parts, largest unit first.
///
/// Zero renders as a single `0 seconds` part so there is always something
/// to show.
pub fn humanize(secs: u64) -> Vec<DurationPart> {
    let mut rest = secs;
    let mut parts = Vec::new();
    for unit in DurationUnit::LADDER {
        let value = rest / unit.seconds();
        rest %= unit.seconds();
        if value > 0 {
            parts.push(DurationPart { value, unit });
        }
    }
    if parts.is_empty() {
        parts.push(DurationPart {
            value: 0,
            unit: DurationUnit::Second,
        });
    }
    parts
}

/// Join parts as `"1 day, 2 hours, 5 seconds"`.
pub fn format_parts(parts: &[DurationPart]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_renders_zero_seconds() {
        assert_eq!(format_parts(&humanize(0)), "0 seconds");
    }

    #[test]
    fn seconds_only() {
        assert_eq!(format_parts(&humanize(1)), "1 second");
        assert_eq!(format_parts(&humanize(59)), "59 seconds");
    }

    #[test]
    fn skips_zero_units() {
        // 1 day + 5 seconds: hours and minutes are omitted.
        assert_eq!(format_parts(&humanize(DAY + 5)), "1 day, 5 seconds");
    }

    #[test]
    fn greedy_over_full_ladder() {
        let secs = YEAR + 2 * MONTH + 3 * DAY + 4 * HOUR + 5 * MINUTE + 6;
        let parts = humanize(secs);
        let values: Vec<u64> = parts.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(parts[0].unit, DurationUnit::Year);
        assert_eq!(parts[5].unit, DurationUnit::Second);
    }

    #[test]
    fn two_minutes() {
        assert_eq!(format_parts(&humanize(120)), "2 minutes");
    }

    #[test]
    fn parts_sum_back_to_input() {
        for secs in [0, 1, 61, 3_601, 90_061, MONTH + 1, YEAR * 3 + 17] {
            let total: u64 = humanize(secs)
                .iter()
                .map(|p| p.value * p.unit.seconds())
                .sum();
            assert_eq!(total, secs);
        }
    }

    #[test]
    fn serializes_snake_case_unit() {
        let json = serde_json::to_value(humanize(3_600)).unwrap();
        assert_eq!(json, serde_json::json!([{ "value": 1, "unit": "hour" }]));
    }
}
