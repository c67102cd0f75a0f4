//! Simulated time units.
//!
//! Simulated time is an absolute number of seconds since the start of a run.

/// Absolute simulated time (or a duration) in seconds.
pub type SimTime = u64;

pub const HOUR: SimTime = 60 * 60;
pub const DAY: SimTime = 24 * HOUR;
/// A month is flattened to 30 days.
pub const MONTH: SimTime = 30 * DAY;

/// Whole hours contained in `secs`.
pub fn as_hours(secs: SimTime) -> u64 {
    secs / HOUR
}
