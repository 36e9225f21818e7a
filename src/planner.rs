//! Notification planning for today's lectures
//!
//! An epoch is one (division, notifications flag, weekday) combination. Within
//! an epoch every slot can raise two alerts, each at most once:
//! "upcoming" ahead of the slot start and "ending soon" ahead of its end.
//! Changing the epoch cancels every outstanding timer before anything new is
//! scheduled, and starts a fresh fired-alert set.

use chrono::{NaiveTime, TimeDelta};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::notify::Notifier;
use crate::resolver::{format_clock, format_duration, minutes_remaining_ceil, SlotBounds};
use crate::timetable::DaySchedule;

pub const UPCOMING_TITLE: &str = "📚 Upcoming Lecture!";
pub const ENDING_TITLE: &str = "⏰ Current Lecture Ending Soon!";
pub const NO_MORE_LECTURES: &str = "No more lectures";

/// How far ahead of a boundary each alert fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadTimes {
    pub before_start: TimeDelta,
    pub before_end: TimeDelta,
}

impl LeadTimes {
    pub fn from_minutes(before_start: i64, before_end: i64) -> Self {
        Self {
            before_start: TimeDelta::minutes(before_start),
            before_end: TimeDelta::minutes(before_end),
        }
    }
}

impl Default for LeadTimes {
    fn default() -> Self {
        Self::from_minutes(10, 5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertPhase {
    UpcomingStart,
    EndingSoon,
}

/// Deduplication key for one alert within an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertKey {
    pub slot: usize,
    pub phase: AlertPhase,
}

impl AlertKey {
    pub fn upcoming(slot: usize) -> Self {
        Self { slot, phase: AlertPhase::UpcomingStart }
    }

    pub fn ending(slot: usize) -> Self {
        Self { slot, phase: AlertPhase::EndingSoon }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase {
            AlertPhase::UpcomingStart => write!(f, "upcoming-{}", self.slot),
            AlertPhase::EndingSoon => write!(f, "ending-{}", self.slot),
        }
    }
}

/// Scope within which scheduled alerts and fired keys are valid
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Epoch {
    pub division: String,
    pub notifications_enabled: bool,
    pub weekday: &'static str,
}

/// When a candidate alert should go out, decided at planning time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTiming {
    /// Trigger still ahead: one-shot timer after this delay
    At(Duration),
    /// Inside the warning window already: fire now with the real remaining minutes
    Now { remaining_minutes: i64 },
    /// Boundary already passed
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAlert {
    pub key: AlertKey,
    pub timing: AlertTiming,
    pub title: String,
    pub body: String,
}

fn timing_for(boundary: NaiveTime, lead: TimeDelta, now: NaiveTime) -> AlertTiming {
    let until_boundary = boundary - now;
    let until_trigger = until_boundary - lead;

    if until_trigger > TimeDelta::zero() {
        AlertTiming::At(until_trigger.to_std().unwrap_or_default())
    } else if until_boundary > TimeDelta::zero() {
        AlertTiming::Now {
            remaining_minutes: minutes_remaining_ceil(until_boundary),
        }
    } else {
        AlertTiming::Stale
    }
}

/// Every candidate alert for today's non-blank slots, timed against `now`
pub fn plan_alerts(
    schedule: &DaySchedule,
    bounds: &[Option<SlotBounds>],
    now: NaiveTime,
    leads: &LeadTimes,
) -> Vec<PlannedAlert> {
    let mut alerts = Vec::new();

    for (i, label) in schedule.labels().iter().enumerate() {
        if schedule.class_at(i).is_none() {
            continue;
        }
        let Some(slot) = bounds.get(i).copied().flatten() else {
            debug!("Slot {} has no usable bounds, no alerts for {}", i, label);
            continue;
        };

        let start_text = format_clock(slot.start);
        let timing = timing_for(slot.start, leads.before_start, now);
        let body = match timing {
            AlertTiming::Now { remaining_minutes } => format!(
                "{} starts in {} minute(s) at {}",
                label, remaining_minutes, start_text
            ),
            _ => format!(
                "{} starts in {} minutes at {}",
                label,
                leads.before_start.num_minutes(),
                start_text
            ),
        };
        alerts.push(PlannedAlert {
            key: AlertKey::upcoming(i),
            timing,
            title: UPCOMING_TITLE.to_string(),
            body,
        });

        let next = schedule.label(i + 1).unwrap_or(NO_MORE_LECTURES);
        let timing = timing_for(slot.end, leads.before_end, now);
        let body = match timing {
            AlertTiming::Now { remaining_minutes } => format!(
                "{} ends in {} minute(s). Next: {}",
                label, remaining_minutes, next
            ),
            _ => format!(
                "{} ends in {} minutes. Next: {}",
                label,
                leads.before_end.num_minutes(),
                next
            ),
        };
        alerts.push(PlannedAlert {
            key: AlertKey::ending(i),
            timing,
            title: ENDING_TITLE.to_string(),
            body,
        });
    }

    alerts
}

/// Title and body of the one-off message sent after switching division
pub fn switch_summary(
    division: &str,
    schedule: &DaySchedule,
    bounds: &[Option<SlotBounds>],
    now: NaiveTime,
) -> (String, String) {
    let next = bounds.iter().enumerate().find_map(|(i, b)| {
        let b = (*b)?;
        if b.start <= now {
            return None;
        }
        schedule.class_at(i).map(|label| (label, b.start))
    });

    let body = match next {
        Some((label, start)) => format!("Next: {} — {}", label, format_clock(start)),
        None => "Next: No more lectures today".to_string(),
    };
    (format!("Switched to {}", division), body)
}

/// Keys already delivered in the current epoch
#[derive(Debug, Clone, Default)]
pub struct FiredAlerts(Arc<Mutex<HashSet<AlertKey>>>);

impl FiredAlerts {
    fn lock(&self) -> MutexGuard<'_, HashSet<AlertKey>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a key; false if it was already present
    pub fn insert(&self, key: AlertKey) -> bool {
        self.lock().insert(key)
    }

    pub fn contains(&self, key: &AlertKey) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<AlertKey> {
        let mut keys: Vec<AlertKey> = self.lock().iter().copied().collect();
        keys.sort();
        keys
    }
}

/// Emit an alert unless its key already fired. Returns whether it was emitted.
async fn emit_once<N: Notifier>(
    notifier: &N,
    fired: &FiredAlerts,
    key: AlertKey,
    title: &str,
    body: &str,
) -> bool {
    if !fired.insert(key) {
        debug!("Alert {} already fired this epoch", key);
        return false;
    }
    info!("Alert {}: {}", key, body);
    if let Err(e) = notifier.notify(title, body).await {
        warn!("Alert {} not delivered: {:#}", key, e);
    }
    true
}

/// A pending one-shot timer the planner can cancel
pub trait TimerHandle {
    fn cancel(&self);
    fn is_finished(&self) -> bool;
}

pub struct ScheduledTimer {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle for ScheduledTimer {
    fn cancel(&self) {
        self.cancel.cancel();
        self.task.abort();
    }

    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Timers and fired keys of the current epoch, owned in one place
pub struct PlannerState<H: TimerHandle = ScheduledTimer> {
    epoch: Option<Epoch>,
    fired: FiredAlerts,
    timers: Vec<(AlertKey, H)>,
}

impl<H: TimerHandle> Default for PlannerState<H> {
    fn default() -> Self {
        Self {
            epoch: None,
            fired: FiredAlerts::default(),
            timers: Vec::new(),
        }
    }
}

impl<H: TimerHandle> PlannerState<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every outstanding timer. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        for (_, handle) in self.timers.drain(..) {
            handle.cancel();
        }
        count
    }

    /// Cancel all timers and enter `epoch`. The fired set survives only when
    /// the epoch is unchanged. Returns whether the epoch changed.
    pub fn reset(&mut self, epoch: Epoch) -> bool {
        self.cancel_all();
        let changed = self.epoch.as_ref() != Some(&epoch);
        if changed {
            // Fresh allocation: stray clones held by old tasks can't leak in
            self.fired = FiredAlerts::default();
        }
        self.epoch = Some(epoch);
        changed
    }

    pub fn track(&mut self, key: AlertKey, handle: H) {
        self.timers.retain(|(_, h)| !h.is_finished());
        self.timers.push((key, handle));
    }

    /// Drop every timer and forget the epoch
    pub fn teardown(&mut self) {
        self.cancel_all();
        self.epoch = None;
        self.fired = FiredAlerts::default();
    }

    pub fn epoch(&self) -> Option<&Epoch> {
        self.epoch.as_ref()
    }

    pub fn fired(&self) -> &FiredAlerts {
        &self.fired
    }

    /// Keys whose timers have not fired yet
    pub fn pending(&self) -> Vec<AlertKey> {
        self.timers
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(k, _)| *k)
            .collect()
    }
}

impl<H: TimerHandle> Drop for PlannerState<H> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Counts from one planning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub cancelled: usize,
    pub epoch_changed: bool,
    pub scheduled: usize,
    pub fired_now: usize,
    pub suppressed: usize,
    pub stale: usize,
}

pub struct NotificationPlanner<N: Notifier> {
    notifier: Arc<N>,
    leads: LeadTimes,
    state: PlannerState,
}

impl<N: Notifier> NotificationPlanner<N> {
    pub fn new(notifier: Arc<N>, leads: LeadTimes) -> Self {
        Self {
            notifier,
            leads,
            state: PlannerState::new(),
        }
    }

    pub fn notifier(&self) -> &Arc<N> {
        &self.notifier
    }

    pub fn leads(&self) -> LeadTimes {
        self.leads
    }

    pub fn epoch(&self) -> Option<&Epoch> {
        self.state.epoch()
    }

    pub fn pending(&self) -> Vec<AlertKey> {
        self.state.pending()
    }

    pub fn fired(&self) -> Vec<AlertKey> {
        self.state.fired().keys()
    }

    /// Cancel everything from the previous pass and plan `epoch` from `now`.
    ///
    /// Old timers are cancelled before the first await, so none of them can
    /// fire once this is called.
    pub async fn replan(
        &mut self,
        epoch: Epoch,
        schedule: &DaySchedule,
        bounds: &[Option<SlotBounds>],
        now: NaiveTime,
    ) -> PlanSummary {
        let cancelled = self.state.cancel_all();
        let epoch_changed = self.state.reset(epoch.clone());
        let mut summary = PlanSummary {
            cancelled,
            epoch_changed,
            ..PlanSummary::default()
        };

        if !epoch.notifications_enabled {
            debug!("Notifications off for {}, planner idle", epoch.division);
            return summary;
        }
        if !self.notifier.is_permitted() {
            info!("Notifications not permitted, planner idle");
            return summary;
        }

        for alert in plan_alerts(schedule, bounds, now, &self.leads) {
            match alert.timing {
                AlertTiming::At(delay) => {
                    debug!("Alert {} in {}", alert.key, format_duration(delay));
                    let key = alert.key;
                    let handle = self.spawn_timer(alert, delay);
                    self.state.track(key, handle);
                    summary.scheduled += 1;
                }
                AlertTiming::Now { .. } => {
                    let emitted = emit_once(
                        &*self.notifier,
                        self.state.fired(),
                        alert.key,
                        &alert.title,
                        &alert.body,
                    )
                    .await;
                    if emitted {
                        summary.fired_now += 1;
                    } else {
                        summary.suppressed += 1;
                    }
                }
                AlertTiming::Stale => summary.stale += 1,
            }
        }

        info!(
            "Planned {} {}: {} scheduled, {} fired now, {} past",
            epoch.division, epoch.weekday, summary.scheduled, summary.fired_now, summary.stale
        );
        summary
    }

    fn spawn_timer(&self, alert: PlannedAlert, delay: Duration) -> ScheduledTimer {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let notifier = Arc::clone(&self.notifier);
        let fired = self.state.fired().clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        emit_once(&*notifier, &fired, alert.key, &alert.title, &alert.body).await;
                    }
                }
            }
        });

        ScheduledTimer { cancel, task }
    }

    /// One-off "Switched to" message; bypasses the fired set
    pub async fn announce_switch(
        &self,
        epoch: &Epoch,
        schedule: &DaySchedule,
        bounds: &[Option<SlotBounds>],
        now: NaiveTime,
    ) -> bool {
        if !epoch.notifications_enabled || !self.notifier.is_permitted() {
            return false;
        }
        let (title, body) = switch_summary(&epoch.division, schedule, bounds, now);
        if let Err(e) = self.notifier.notify(&title, &body).await {
            warn!("Switch summary not delivered: {:#}", e);
        }
        true
    }

    pub fn teardown(&mut self) {
        self.state.teardown();
    }
}
