//! Hour-granularity cadence shared by the geo, GUI and core updaters.
//!
//! Each loop wakes once per base tick and fires when the whole hours elapsed
//! since its last run are a multiple of the configured interval. This is an
//! approximate cadence: a delayed tick or an interval changed mid-cycle shifts
//! the alignment rather than being corrected for.

use tokio::time::Instant;

const SECS_PER_HOUR: u64 = 3600;

/// `elapsed_hours mod interval_hours == 0`, with a zero interval never due.
#[must_use]
pub fn is_due(elapsed_hours: u64, interval_hours: u32) -> bool {
    interval_hours > 0 && elapsed_hours % u64::from(interval_hours) == 0
}

/// Per-loop schedule state. Owned by exactly one loop.
#[derive(Debug, Clone)]
pub struct CadenceState {
    last_run_mark: Instant,
    tick_count: u64,
}

impl CadenceState {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            last_run_mark: now,
            tick_count: 0,
        }
    }

    #[must_use]
    pub fn elapsed_hours(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.last_run_mark).as_secs() / SECS_PER_HOUR
    }

    /// Record a wake-up and report whether the activity should fire.
    pub fn tick(&mut self, now: Instant, interval_hours: u32) -> bool {
        self.tick_count += 1;
        is_due(self.elapsed_hours(now), interval_hours)
    }

    /// Reset the mark after the activity ran.
    pub fn mark_run(&mut self, now: Instant) {
        self.last_run_mark = now;
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{CadenceState, is_due};

    fn hours(n: u64) -> Duration {
        Duration::from_secs(n * 3600)
    }

    #[test]
    fn fires_on_multiples_of_interval() {
        let fired: Vec<u64> = (0..=6).filter(|&elapsed| is_due(elapsed, 3)).collect();
        assert_eq!(fired, vec![0, 3, 6]);
    }

    #[test]
    fn zero_interval_never_fires() {
        assert!((0..=48).all(|elapsed| !is_due(elapsed, 0)));
    }

    #[test]
    fn elapsed_hours_rounds_down() {
        let start = Instant::now();
        let state = CadenceState::new(start);

        assert_eq!(state.elapsed_hours(start + Duration::from_secs(3599)), 0);
        assert_eq!(state.elapsed_hours(start + Duration::from_secs(7201)), 2);
    }

    #[test]
    fn hourly_ticks_fire_every_interval_after_mark_reset() {
        let start = Instant::now();
        let mut state = CadenceState::new(start);
        let mut fired_at = Vec::new();

        for hour in 1..=9 {
            let now = start + hours(hour);
            if state.tick(now, 3) {
                fired_at.push(hour);
                state.mark_run(now);
            }
        }

        assert_eq!(fired_at, vec![3, 6, 9]);
        assert_eq!(state.tick_count(), 9);
    }

    #[test]
    fn interval_of_one_fires_every_tick() {
        let start = Instant::now();
        let mut state = CadenceState::new(start);

        for hour in 1..=4 {
            let now = start + hours(hour);
            assert!(state.tick(now, 1));
            state.mark_run(now);
        }
    }
}
