//! Reconnect backoff policy for the cloud poll timer.
//!
//! The poll period is reset to the default whenever a setup attempt is
//! dispatched successfully. The first failure after a healthy period jumps
//! straight to the minimum reconnect period; further failures double the
//! period up to the configured ceiling.

use std::time::Duration;

/// Computes the poll period to use after a session setup attempt.
///
/// Pure and deterministic: the caller owns the current period and feeds it
/// back in on the next attempt.
pub fn next_poll_period(
    current: Duration,
    default: Duration,
    min: Duration,
    max: Duration,
    succeeded: bool,
) -> Duration {
    if succeeded {
        return default;
    }

    if current == default {
        min
    } else {
        std::cmp::min(current * 2, max)
    }
}
