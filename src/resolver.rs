/// Time resolution for the daily slot table
/// Maps a wall-clock reading to the slot it falls in and to distances from slot boundaries

use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Separators accepted between the start and end of an interval
const SEPARATORS: [char; 2] = ['–', '-'];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntervalError {
    #[error("interval '{0}' has no start/end separator")]
    MissingSeparator(String),
    #[error("'{0}' is not a clock time")]
    InvalidTime(String),
    #[error("interval '{0}' does not end after it starts")]
    Inverted(String),
}

/// Half-open interval [start, end) within a day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBounds {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SlotBounds {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// Current wall-clock time in the given zone
pub fn local_now(tz: Tz) -> DateTime<Tz> {
    tz.from_utc_datetime(&Utc::now().naive_utc())
}

/// Canonical weekday name, the key used by the timetable
pub fn weekday_name<D: Datelike>(date: &D) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parse "H:MM" into (hour, minute) as written
pub fn parse_clock(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    if !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

/// Earliest 24-hour reading of a clock-face time that is not before `after`.
/// Hours above 12 are already 24-hour and are taken as-is.
fn resolve_reading(hour: u32, minute: u32, after: Option<NaiveTime>) -> Option<NaiveTime> {
    let plain = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let Some(after) = after else {
        return Some(plain);
    };
    if plain >= after || hour == 0 || hour > 12 {
        return Some(plain);
    }
    // 12:xx on the clock face is just after noon, 1:xx-11:xx roll to the afternoon
    let shifted = if hour == 12 { hour } else { hour + 12 };
    NaiveTime::from_hms_opt(shifted, minute, 0).filter(|t| *t >= after)
}

/// Parse one interval string, resolving clock-face readings against the
/// previous boundary of the day
pub fn parse_interval(s: &str, after: Option<NaiveTime>) -> Result<SlotBounds, IntervalError> {
    let (start, end) = s
        .split_once(SEPARATORS)
        .ok_or_else(|| IntervalError::MissingSeparator(s.to_string()))?;

    let (sh, sm) = parse_clock(start).ok_or_else(|| IntervalError::InvalidTime(start.trim().to_string()))?;
    let (eh, em) = parse_clock(end).ok_or_else(|| IntervalError::InvalidTime(end.trim().to_string()))?;

    let start = resolve_reading(sh, sm, after).ok_or_else(|| IntervalError::Inverted(s.to_string()))?;
    let end = resolve_reading(eh, em, Some(start)).ok_or_else(|| IntervalError::Inverted(s.to_string()))?;

    if end <= start {
        return Err(IntervalError::Inverted(s.to_string()));
    }

    Ok(SlotBounds { start, end })
}

/// Resolve the whole slot table. A malformed entry yields `None` for that slot
/// and resolution continues from the last good boundary.
pub fn resolve_bounds<S: AsRef<str>>(slots: &[S]) -> Vec<Option<SlotBounds>> {
    let mut after = None;
    slots
        .iter()
        .map(|s| match parse_interval(s.as_ref(), after) {
            Ok(bounds) => {
                after = Some(bounds.end);
                Some(bounds)
            }
            Err(e) => {
                warn!("Ignoring slot: {}", e);
                None
            }
        })
        .collect()
}

/// Index of the slot containing `now`, if any
pub fn current_slot_index(bounds: &[Option<SlotBounds>], now: NaiveTime) -> Option<usize> {
    bounds
        .iter()
        .position(|b| b.is_some_and(|b| b.contains(now)))
}

/// Index of the first slot starting strictly after `now`
pub fn next_slot_index(bounds: &[Option<SlotBounds>], now: NaiveTime) -> Option<usize> {
    bounds
        .iter()
        .position(|b| b.is_some_and(|b| b.start > now))
}

/// Whole minutes from `now` until `boundary`, rounded down. Negative once passed.
pub fn minutes_until(boundary: NaiveTime, now: NaiveTime) -> i64 {
    (boundary - now).num_milliseconds().div_euclid(60_000)
}

/// Whole minutes until `boundary`, rounded up and never below 1.
/// Used for alert text inside a warning window.
pub fn minutes_remaining_ceil(remaining: TimeDelta) -> i64 {
    let ms = remaining.num_milliseconds();
    let minutes = ms / 60_000 + i64::from(ms % 60_000 > 0);
    minutes.max(1)
}

/// Format a clock time the way the slot table writes it ("1:00", "10:20")
pub fn format_clock(t: NaiveTime) -> String {
    t.format("%-I:%M").to_string()
}

/// Format duration for logging
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    #[kani::unwind(3)]
    fn current_slot_is_in_range() {
        let secs: u32 = kani::any();
        kani::assume(secs < 86_400);
        let now = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap();
        let bounds = [
            NaiveTime::from_hms_opt(10, 20, 0).zip(NaiveTime::from_hms_opt(11, 0, 0)),
            NaiveTime::from_hms_opt(11, 0, 0).zip(NaiveTime::from_hms_opt(11, 40, 0)),
        ]
        .map(|b| b.map(|(start, end)| SlotBounds { start, end }));

        if let Some(i) = current_slot_index(&bounds, now) {
            kani::assert(i < bounds.len(), "index must be in range");
            kani::assert(bounds[i].unwrap().contains(now), "slot must contain now");
        }
    }
}
