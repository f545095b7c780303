//! Exponential backoff shared by the completion client and the job queue.

use std::time::Duration;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// never more than `max`.
///
/// Non-decreasing in `attempt` and bounded by `max`. An `attempt` of 0 is
/// treated as 1.
pub fn exponential_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << exponent;
    base.checked_mul(factor).unwrap_or(max).min(max)
}
