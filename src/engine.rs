//! Schedule clock
//!
//! Owns the session: selected division, notifications flag and today's date.
//! Each change is persisted and produces exactly one planner pass through
//! [`ScheduleClock::on_epoch_changed`].

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::notify::Notifier;
use crate::planner::{AlertKey, Epoch, LeadTimes, NotificationPlanner, PlanSummary};
use crate::prefs::{PreferenceStore, DIVISION_KEY, NOTIFICATIONS_KEY};
use crate::resolver::{resolve_bounds, weekday_name, SlotBounds};
use crate::ticker::{live_status, LiveStatus};
use crate::timetable::{DaySchedule, Timetable};

pub const ENABLED_TITLE: &str = "🔔 Notifications Enabled!";
pub const ENABLED_BODY: &str = "You'll get alerts for upcoming lectures";

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("unknown division '{0}'")]
    UnknownDivision(String),
}

pub struct ScheduleClock<N: Notifier> {
    timetable: Arc<Timetable>,
    bounds: Vec<Option<SlotBounds>>,
    planner: NotificationPlanner<N>,
    prefs: Box<dyn PreferenceStore>,
    division: String,
    notifications_enabled: bool,
    date: Option<NaiveDate>,
}

impl<N: Notifier> ScheduleClock<N> {
    /// Restore the session from stored preferences
    pub fn new(
        config: &Config,
        timetable: Arc<Timetable>,
        notifier: Arc<N>,
        prefs: Box<dyn PreferenceStore>,
    ) -> Self {
        let stored = prefs.get(DIVISION_KEY);
        let division = stored
            .as_deref()
            .and_then(|name| timetable.find_division(name))
            .or_else(|| {
                let wanted = config.default_division.as_deref()?;
                let found = timetable.find_division(wanted);
                if found.is_none() {
                    warn!("DEFAULT_DIVISION '{}' is not in the timetable", wanted);
                }
                found
            })
            .unwrap_or_else(|| timetable.default_division())
            .to_string();

        if let Some(name) = stored.filter(|s| timetable.find_division(s).is_none()) {
            info!("Stored division '{}' not found, using {}", name, division);
        }

        let notifications_enabled =
            prefs.get(NOTIFICATIONS_KEY).as_deref() == Some("true") || notifier.is_permitted();

        let leads = LeadTimes::from_minutes(config.start_alert_minutes, config.end_alert_minutes);
        let bounds = resolve_bounds(timetable.time_slots());

        Self {
            timetable,
            bounds,
            planner: NotificationPlanner::new(notifier, leads),
            prefs,
            division,
            notifications_enabled,
            date: None,
        }
    }

    /// Apply start-up choices to the restored session. Call before
    /// [`ScheduleClock::start`]: nothing is planned or sent here, `start`
    /// persists the result and plans once. An unknown division leaves the
    /// restored one selected; the notifications choice still applies.
    pub async fn apply_startup_overrides(
        &mut self,
        division: Option<&str>,
        notify: Option<bool>,
    ) -> Result<(), EngineError> {
        match notify {
            Some(true) => {
                self.notifications_enabled =
                    self.planner.notifier().request_permission().await.is_granted();
                if !self.notifications_enabled {
                    warn!("Notification permission denied");
                }
            }
            Some(false) => self.notifications_enabled = false,
            None => {}
        }

        if let Some(query) = division {
            self.division = self
                .timetable
                .find_division(query)
                .ok_or_else(|| EngineError::UnknownDivision(query.trim().to_string()))?
                .to_string();
        }
        Ok(())
    }

    /// Persist the restored state and plan today
    pub async fn start(&mut self, now: DateTime<Tz>) -> PlanSummary {
        info!(
            "Starting with {} (notifications {})",
            self.division,
            if self.notifications_enabled { "on" } else { "off" }
        );
        self.date = Some(now.date_naive());
        self.prefs.set(DIVISION_KEY, &self.division);
        self.persist_notifications();
        self.on_epoch_changed(now).await
    }

    /// Re-plan for the current (division, flag, weekday) at `now`
    pub async fn on_epoch_changed(&mut self, now: DateTime<Tz>) -> PlanSummary {
        let epoch = self.epoch(&now);
        let schedule = self.today(&now);
        self.planner
            .replan(epoch, &schedule, &self.bounds, now.time())
            .await
    }

    /// Switch division by name or numeral. Sends the "Switched to" summary
    /// when notifications are on.
    pub async fn set_division(
        &mut self,
        query: &str,
        now: DateTime<Tz>,
    ) -> Result<PlanSummary, EngineError> {
        let name = self
            .timetable
            .find_division(query)
            .ok_or_else(|| EngineError::UnknownDivision(query.trim().to_string()))?
            .to_string();

        if name == self.division {
            debug!("{} already selected", name);
            return Ok(PlanSummary::default());
        }

        info!("Division changed: {} -> {}", self.division, name);
        self.division = name;
        self.prefs.set(DIVISION_KEY, &self.division);

        let summary = self.on_epoch_changed(now).await;

        let epoch = self.epoch(&now);
        let schedule = self.today(&now);
        self.planner
            .announce_switch(&epoch, &schedule, &self.bounds, now.time())
            .await;

        Ok(summary)
    }

    /// Turn notifications on (asking the notifier for permission) or off
    pub async fn set_notifications(&mut self, enable: bool, now: DateTime<Tz>) -> PlanSummary {
        if enable {
            let permission = self.planner.notifier().request_permission().await;
            self.notifications_enabled = permission.is_granted();
            if self.notifications_enabled {
                info!("Notifications enabled");
                if let Err(e) = self.planner.notifier().notify(ENABLED_TITLE, ENABLED_BODY).await {
                    warn!("Confirmation not delivered: {:#}", e);
                }
            } else {
                warn!("Notification permission denied");
            }
        } else {
            info!("Notifications disabled");
            self.notifications_enabled = false;
        }

        self.persist_notifications();
        self.on_epoch_changed(now).await
    }

    /// Re-plan when the local date has moved on. Called once per tick.
    pub async fn sync_day(&mut self, now: DateTime<Tz>) -> Option<PlanSummary> {
        let date = now.date_naive();
        if self.date == Some(date) {
            return None;
        }

        info!("New day: {} ({})", date, weekday_name(&now));
        self.date = Some(date);
        // A week-long gap keeps the weekday; start from a clean epoch anyway
        self.planner.teardown();
        Some(self.on_epoch_changed(now).await)
    }

    fn persist_notifications(&mut self) {
        let value = if self.notifications_enabled { "true" } else { "false" };
        self.prefs.set(NOTIFICATIONS_KEY, value);
    }

    pub fn epoch(&self, now: &DateTime<Tz>) -> Epoch {
        Epoch {
            division: self.division.clone(),
            notifications_enabled: self.notifications_enabled,
            weekday: weekday_name(now),
        }
    }

    /// Today's labels for the selected division
    pub fn today(&self, now: &DateTime<Tz>) -> DaySchedule {
        self.timetable.day(&self.division, weekday_name(now))
    }

    pub fn live_status(&self, now: &DateTime<Tz>) -> LiveStatus {
        live_status(&self.today(now), &self.bounds, now.time())
    }

    pub fn division(&self) -> &str {
        &self.division
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    pub fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    pub fn leads(&self) -> LeadTimes {
        self.planner.leads()
    }

    pub fn bounds(&self) -> &[Option<SlotBounds>] {
        &self.bounds
    }

    pub fn pending_alerts(&self) -> Vec<AlertKey> {
        self.planner.pending()
    }

    pub fn fired_alerts(&self) -> Vec<AlertKey> {
        self.planner.fired()
    }

    /// Cancel every outstanding alert timer
    pub fn teardown(&mut self) {
        self.planner.teardown();
        debug!("Schedule clock torn down");
    }
}
