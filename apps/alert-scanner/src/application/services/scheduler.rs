//! Polling cadences.
//!
//! Three independent timers drive the scan loop. All three fire on start and
//! then once per period. Missed ticks are skipped rather than replayed, so a
//! slow cycle never causes a burst of catch-up work.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::infrastructure::config::ScheduleSettings;

/// Work due on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Quote snapshot scan.
    Scan,
    /// Unusual options poll.
    UnusualOptions,
    /// Top gainers summary.
    TopGainers,
}

/// The three polling timers.
#[derive(Debug)]
pub struct Scheduler {
    scan: Interval,
    options: Interval,
    gainers: Interval,
}

impl Scheduler {
    /// Create timers for the given cadences, starting now.
    #[must_use]
    pub fn new(settings: &ScheduleSettings) -> Self {
        let start = Instant::now();
        Self {
            scan: timer(start, settings.scan_interval),
            options: timer(start, settings.options_interval),
            gainers: timer(start, settings.gainers_interval),
        }
    }

    /// Wait for the next due task.
    ///
    /// When several timers are due together the scan comes first, then
    /// options, then gainers; the others fire on the following calls.
    pub async fn next(&mut self) -> ScheduledTask {
        tokio::select! {
            biased;
            _ = self.scan.tick() => ScheduledTask::Scan,
            _ = self.options.tick() => ScheduledTask::UnusualOptions,
            _ = self.gainers.tick() => ScheduledTask::TopGainers,
        }
    }
}

fn timer(start: Instant, period: Duration) -> Interval {
    let mut interval = interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
