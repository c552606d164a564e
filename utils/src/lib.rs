//! Shared utilities for the staker dashboard.

pub mod duration;
pub mod logging;

pub use duration::{format_parts, humanize, DurationPart, DurationUnit};
pub use logging::{init_logging, LogFormat};
