//! Live ticker
//! Recomputes current slot, next slot and countdown once per tick

use chrono::{DateTime, NaiveTime, TimeDelta};
use chrono_tz::Tz;
use std::fmt;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

use crate::resolver::{current_slot_index, local_now, next_slot_index, SlotBounds};
use crate::timetable::DaySchedule;

/// Countdown to the next slot start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Minutes(i64),
    Seconds(i64),
    StartingNow,
    /// No later slot today
    None,
}

impl Countdown {
    pub fn until(start: NaiveTime, now: NaiveTime) -> Self {
        countdown_from(start - now)
    }
}

fn countdown_from(remaining: TimeDelta) -> Countdown {
    let mins = remaining.num_minutes();
    let secs = remaining.num_seconds();
    if mins > 0 {
        Countdown::Minutes(mins)
    } else if secs > 0 {
        Countdown::Seconds(secs)
    } else {
        Countdown::StartingNow
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Countdown::Minutes(n) => write!(f, "⏳ Next in {} min{}", n, if n > 1 { "s" } else { "" }),
            Countdown::Seconds(n) => write!(f, "⏳ Next in {} sec{}", n, if n > 1 { "s" } else { "" }),
            Countdown::StartingNow => write!(f, "🚀 Starting now!"),
            Countdown::None => Ok(()),
        }
    }
}

/// One tick's view of the day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStatus {
    pub current_index: Option<usize>,
    pub current: Option<String>,
    pub next_index: Option<usize>,
    pub next: Option<String>,
    pub countdown: Countdown,
}

/// Testable version: status of `schedule` at `now`
pub fn live_status(schedule: &DaySchedule, bounds: &[Option<SlotBounds>], now: NaiveTime) -> LiveStatus {
    let current_index = current_slot_index(bounds, now);
    let next_index = next_slot_index(bounds, now);

    let countdown = match next_index.and_then(|i| bounds.get(i).copied().flatten()) {
        Some(next) => Countdown::until(next.start, now),
        None => Countdown::None,
    };

    LiveStatus {
        current_index,
        current: current_index.and_then(|i| schedule.label(i)).map(str::to_string),
        next_index,
        next: next_index.and_then(|i| schedule.label(i)).map(str::to_string),
        countdown,
    }
}

/// Fixed-cadence clock for the live view
pub struct LiveTicker {
    interval: Interval,
    timezone: Tz,
}

impl LiveTicker {
    pub fn new(period: Duration, timezone: Tz) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Live ticker every {:?} in {}", period, timezone);
        Self { interval, timezone }
    }

    /// Wait for the next tick and read the clock once for it
    pub async fn tick(&mut self) -> DateTime<Tz> {
        self.interval.tick().await;
        local_now(self.timezone)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::resolver::resolve_bounds;
    use crate::timetable::{DaySchedule, TIME_SLOTS};
    use proptest::prelude::*;

    proptest! {
        /// Current slot, if any, contains now and next starts after it
        #[test]
        fn status_is_consistent(secs in 0u32..86_400) {
            let now = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap();
            let bounds = resolve_bounds(&TIME_SLOTS);
            let day = DaySchedule::new(TIME_SLOTS.iter().map(|s| format!("L{}", s)));
            let status = live_status(&day, &bounds, now);

            if let Some(i) = status.current_index {
                prop_assert!(bounds[i].unwrap().contains(now));
            }
            if let Some(n) = status.next_index {
                prop_assert!(bounds[n].unwrap().start > now);
                prop_assert!(status.countdown != Countdown::None);
            } else {
                prop_assert_eq!(status.countdown, Countdown::None);
            }
        }
    }
}
