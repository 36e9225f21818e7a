//! Terminal shell
//!
//! Line commands read from stdin and the text views printed to stdout.

use chrono::{DateTime, NaiveTime};
use chrono_tz::Tz;
use std::fmt::Write as _;
use thiserror::Error;

use crate::engine::ScheduleClock;
use crate::notify::Notifier;
use crate::planner::LeadTimes;
use crate::resolver::{minutes_until, weekday_name, SlotBounds};
use crate::ticker::{Countdown, LiveStatus};
use crate::timetable::{is_blank, DaySchedule, DivisionSchedule, BLANK};

/// Slots starting within this many minutes get a bell in today's list
pub const BELL_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Division(String),
    Notify(bool),
    /// `None` clears the filter
    Search(Option<String>),
    Week,
    Today,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "division" | "div" | "d" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("division <name>"));
                }
                Command::Division(rest.to_string())
            }
            "notify" | "n" => match rest.to_ascii_lowercase().as_str() {
                "on" | "enable" => Command::Notify(true),
                "off" | "disable" => Command::Notify(false),
                _ => return Err(CommandError::Usage("notify on|off")),
            },
            "search" | "s" | "/" => {
                Command::Search(Some(rest.to_string()).filter(|q| !q.is_empty()))
            }
            "week" | "w" => Command::Week,
            "today" | "t" => Command::Today,
            "status" => Command::Status,
            "help" | "h" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(CommandError::Unknown(word.to_string())),
        };
        Ok(Some(command))
    }
}

/// Presentation state that lives only in the shell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub query: String,
    pub show_full: bool,
}

/// Apply a case-insensitive substring filter. Matches keep their label,
/// blanks stay blank, everything else is emptied.
pub fn filter_labels(labels: &[String], query: &str) -> Vec<String> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return labels.to_vec();
    }
    labels
        .iter()
        .map(|label| {
            if label.to_lowercase().contains(&q) {
                label.clone()
            } else if label == BLANK {
                BLANK.to_string()
            } else {
                String::new()
            }
        })
        .collect()
}

/// Which of today's slots start within the bell window
pub fn bell_slots(
    schedule: &DaySchedule,
    bounds: &[Option<SlotBounds>],
    now: NaiveTime,
    enabled: bool,
) -> Vec<bool> {
    schedule
        .labels()
        .iter()
        .enumerate()
        .map(|(i, label)| {
            if !enabled || is_blank(label) {
                return false;
            }
            bounds
                .get(i)
                .copied()
                .flatten()
                .map(|b| minutes_until(b.start, now))
                .is_some_and(|m| m > 0 && m <= BELL_WINDOW_MINUTES)
        })
        .collect()
}

pub fn render_header(division: &str, weekday: &str, enabled: bool, leads: &LeadTimes) -> String {
    let mut out = format!("📚 {} — {}\n", division, weekday);
    if enabled {
        let _ = writeln!(
            out,
            "✅ Notifications enabled - alerts {} min before lectures & {} min before they end",
            leads.before_start.num_minutes(),
            leads.before_end.num_minutes()
        );
    } else {
        out.push_str("🔔 Notifications off - type 'notify on' for lecture alerts\n");
    }
    out
}

pub fn render_status(status: &LiveStatus) -> String {
    let mut out = format!(
        "Now: {}\nNext: {}\n",
        status.current.as_deref().unwrap_or("No lecture right now"),
        status.next.as_deref().unwrap_or(BLANK)
    );
    if status.countdown != Countdown::None {
        let _ = writeln!(out, "{}", status.countdown);
    }
    out
}

/// One-line status for the live ticker
pub fn render_status_line(status: &LiveStatus) -> String {
    let mut line = format!(
        "Now: {} | Next: {}",
        status.current.as_deref().unwrap_or("No lecture right now"),
        status.next.as_deref().unwrap_or(BLANK)
    );
    if status.countdown != Countdown::None {
        let _ = write!(line, " | {}", status.countdown);
    }
    line
}

/// Whether the live line is worth printing again. The seconds countdown
/// only reprints every 15 seconds and for the last five.
pub fn status_changed(previous: Option<&LiveStatus>, current: &LiveStatus) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    if previous.current_index != current.current_index || previous.next_index != current.next_index {
        return true;
    }
    match (previous.countdown, current.countdown) {
        (Countdown::Seconds(_), Countdown::Seconds(n)) => {
            previous.countdown != current.countdown && (n % 15 == 0 || n <= 5)
        }
        (a, b) => a != b,
    }
}

pub fn render_today(
    weekday: &str,
    time_slots: &[String],
    labels: &[String],
    current: Option<usize>,
    bells: &[bool],
) -> String {
    let mut out = format!("📅 {} Schedule\n", weekday);
    if labels.is_empty() {
        out.push_str("   No lectures today\n");
        return out;
    }
    for (i, label) in labels.iter().enumerate() {
        let marker = if current == Some(i) { "▶" } else { " " };
        let slot = time_slots.get(i).map(String::as_str).unwrap_or("?");
        let label = if label.is_empty() { BLANK } else { label.as_str() };
        let bell = if bells.get(i).copied().unwrap_or(false) { "  🔔" } else { "" };
        let _ = writeln!(out, " {} {:<12} {}{}", marker, slot, label, bell);
    }
    out
}

/// The whole week for one division, today's current slot marked
pub fn render_week(
    division: &DivisionSchedule,
    time_slots: &[String],
    today: &str,
    current: Option<usize>,
) -> String {
    let mut out = format!("🗓  {} full timetable\n", division.name);
    for (day, schedule) in &division.days {
        let _ = writeln!(out, "\n{}", day);
        for (i, label) in schedule.labels().iter().enumerate() {
            let marker = if day == today && current == Some(i) { "▶" } else { " " };
            let slot = time_slots.get(i).map(String::as_str).unwrap_or("?");
            let _ = writeln!(out, " {} {:<12} {}", marker, slot, label);
        }
    }
    out
}

/// Header, status, today's list and (optionally) the week grid
pub fn render_view<N: Notifier>(
    clock: &ScheduleClock<N>,
    view: &ViewState,
    now: &DateTime<Tz>,
) -> String {
    let weekday = weekday_name(now);
    let schedule = clock.today(now);
    let status = clock.live_status(now);
    let time_slots = clock.timetable().time_slots();

    let labels = filter_labels(schedule.labels(), &view.query);
    let bells = bell_slots(&schedule, clock.bounds(), now.time(), clock.notifications_enabled());

    let mut out = render_header(clock.division(), weekday, clock.notifications_enabled(), &clock.leads());
    out.push('\n');
    out.push_str(&render_status(&status));
    out.push('\n');
    if !view.query.trim().is_empty() {
        let _ = writeln!(out, "🔍 {}", view.query.trim());
    }
    out.push_str(&render_today(weekday, time_slots, &labels, status.current_index, &bells));

    if view.show_full {
        if let Some(division) = clock.timetable().division(clock.division()) {
            out.push('\n');
            out.push_str(&render_week(division, time_slots, weekday, status.current_index));
        }
    }
    out
}

pub fn help_text() -> &'static str {
    "COMMANDS:
    division <name>   Switch division (name, 'ii' or '2')
    notify on|off     Enable or disable lecture alerts; with the console
                      notifier 'off' lasts until the next start
    search <text>     Filter today's list; 'search' alone clears it
    week              Show or hide the full timetable
    today             Show today's schedule
    status            Show what's on now
    help              Show this help
    quit              Exit"
}

/// What the caller should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Render,
    Message(String),
    Quit,
}

/// Run one command against the clock and view state
pub async fn execute<N: Notifier>(
    command: Command,
    clock: &mut ScheduleClock<N>,
    view: &mut ViewState,
    now: DateTime<Tz>,
) -> Outcome {
    match command {
        Command::Division(name) => match clock.set_division(&name, now).await {
            Ok(_) => Outcome::Render,
            Err(e) => {
                let known: Vec<&str> = clock.timetable().division_names().collect();
                Outcome::Message(format!("{}. Choose one of: {}", e, known.join(", ")))
            }
        },
        Command::Notify(enable) => {
            clock.set_notifications(enable, now).await;
            if enable && !clock.notifications_enabled() {
                Outcome::Message("Notification permission denied".to_string())
            } else {
                Outcome::Render
            }
        }
        Command::Search(query) => {
            view.query = query.unwrap_or_default();
            Outcome::Render
        }
        Command::Week => {
            view.show_full = !view.show_full;
            Outcome::Render
        }
        Command::Today => Outcome::Render,
        Command::Status => Outcome::Message(render_status(&clock.live_status(&now))),
        Command::Help => Outcome::Message(help_text().to_string()),
        Command::Quit => Outcome::Quit,
    }
}
