// Countdown arithmetic that tolerates skipped timer ticks.

use std::time::Duration;

/// Outcome of moving the countdown from one observed value to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownStep {
    pub seconds_left: u32,
    /// Thresholds crossed by this step, highest first.
    pub warnings: Vec<u32>,
    pub expired: bool,
}

/// Remaining time units after `elapsed`, derived from wall time rather than tick count.
pub fn remaining_units(duration: u32, elapsed: Duration, unit: Duration) -> u32 {
    let unit_nanos = unit.as_nanos().max(1);
    let elapsed_units = elapsed.as_nanos() / unit_nanos;
    let elapsed_units = u32::try_from(elapsed_units).unwrap_or(u32::MAX);
    duration.saturating_sub(elapsed_units)
}

/// Moves from `previous` to `next`, reporting every threshold in `[next, previous)`:
/// a threshold fires when the value lands on it or jumps past it.
pub fn advance(previous: u32, next: u32, thresholds: &[u32]) -> CountdownStep {
    let next = next.min(previous);
    let mut warnings: Vec<u32> = thresholds
        .iter()
        .copied()
        .filter(|t| *t > 0 && *t >= next && *t < previous)
        .collect();
    warnings.sort_unstable_by(|a, b| b.cmp(a));
    warnings.dedup();

    CountdownStep {
        seconds_left: next,
        warnings,
        expired: next == 0,
    }
}
