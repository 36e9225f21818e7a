//! Integration tests for alert timers
//! Runs the planner on a paused tokio clock and checks what actually gets delivered

use anyhow::Result;
use chrono::NaiveTime;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lecturebell::notify::{Notifier, Permission};
use lecturebell::planner::{AlertKey, Epoch, LeadTimes, NotificationPlanner, ENDING_TITLE, UPCOMING_TITLE};
use lecturebell::resolver::{resolve_bounds, SlotBounds};
use lecturebell::timetable::{DaySchedule, BLANK};

/// Notifier that keeps everything it was asked to deliver
#[derive(Default)]
struct Inbox {
    messages: Mutex<Vec<(String, String)>>,
}

impl Inbox {
    fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    fn bodies(&self) -> Vec<String> {
        self.messages().into_iter().map(|(_, body)| body).collect()
    }
}

impl Notifier for Inbox {
    fn is_permitted(&self) -> bool {
        true
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn bounds() -> Vec<Option<SlotBounds>> {
    resolve_bounds(&["10:20–11:00", "11:00–11:40", "11:40–12:20"])
}

fn division_a() -> DaySchedule {
    DaySchedule::new(["MATHS-102", "PHY-102", BLANK])
}

fn division_b() -> DaySchedule {
    DaySchedule::new([BLANK, "CHEM-211", "ENG-211"])
}

fn epoch(division: &str, enabled: bool) -> Epoch {
    Epoch {
        division: division.to_string(),
        notifications_enabled: enabled,
        weekday: "Monday",
    }
}

async fn advance(minutes: u64) {
    // One extra second so timers due at the boundary have run
    tokio::time::sleep(Duration::from_secs(minutes * 60 + 1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_timers_fire_in_order() {
    let inbox = Arc::new(Inbox::default());
    let mut planner = NotificationPlanner::new(inbox.clone(), LeadTimes::default());

    let summary = planner.replan(epoch("A", true), &division_a(), &bounds(), at(10, 5)).await;
    assert_eq!(summary.scheduled, 4);
    assert_eq!(summary.fired_now, 0);
    assert!(inbox.messages().is_empty());

    // 10:10 upcoming MATHS-102
    advance(5).await;
    assert_eq!(inbox.messages(), vec![(
        UPCOMING_TITLE.to_string(),
        "MATHS-102 starts in 10 minutes at 10:20".to_string()
    )]);

    // 10:50 upcoming PHY-102, 10:55 ending MATHS-102, 11:35 ending PHY-102
    advance(90).await;
    assert_eq!(
        inbox.bodies(),
        vec![
            "MATHS-102 starts in 10 minutes at 10:20",
            "PHY-102 starts in 10 minutes at 11:00",
            "MATHS-102 ends in 5 minutes. Next: PHY-102",
            "PHY-102 ends in 5 minutes. Next: —",
        ]
    );
    assert_eq!(inbox.messages()[2].0, ENDING_TITLE);
    assert!(planner.pending().is_empty());
    assert_eq!(planner.fired().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_epoch_switch_cancels_old_timers() {
    let inbox = Arc::new(Inbox::default());
    let mut planner = NotificationPlanner::new(inbox.clone(), LeadTimes::default());

    let first = planner.replan(epoch("A", true), &division_a(), &bounds(), at(10, 5)).await;
    let switched = planner.replan(epoch("B", true), &division_b(), &bounds(), at(10, 5)).await;
    assert_eq!(switched.cancelled, first.scheduled);
    assert!(switched.epoch_changed);

    // A's 10:10 alert must not arrive
    advance(6).await;
    assert!(inbox.messages().is_empty());

    // B's first class is at 11:00, alert at 10:50
    advance(40).await;
    assert_eq!(inbox.bodies(), vec!["CHEM-211 starts in 10 minutes at 11:00"]);
}

#[tokio::test(start_paused = true)]
async fn test_returning_epoch_may_refire() {
    let inbox = Arc::new(Inbox::default());
    let mut planner = NotificationPlanner::new(inbox.clone(), LeadTimes::default());

    planner.replan(epoch("A", true), &division_a(), &bounds(), at(10, 12)).await;
    planner.replan(epoch("B", true), &division_b(), &bounds(), at(10, 12)).await;
    planner.replan(epoch("A", true), &division_a(), &bounds(), at(10, 13)).await;

    assert_eq!(
        inbox.bodies(),
        vec![
            "MATHS-102 starts in 8 minute(s) at 10:20",
            "MATHS-102 starts in 7 minute(s) at 10:20",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_same_epoch_replan_after_firing_is_suppressed() {
    let inbox = Arc::new(Inbox::default());
    let mut planner = NotificationPlanner::new(inbox.clone(), LeadTimes::default());

    planner.replan(epoch("A", true), &division_a(), &bounds(), at(10, 5)).await;
    advance(5).await;
    assert_eq!(inbox.messages().len(), 1);
    assert_eq!(planner.fired(), vec![AlertKey::upcoming(0)]);

    let summary = planner.replan(epoch("A", true), &division_a(), &bounds(), at(10, 10)).await;
    assert!(!summary.epoch_changed);
    assert_eq!(summary.suppressed, 1);
    assert_eq!(inbox.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabling_silences_everything() {
    let inbox = Arc::new(Inbox::default());
    let mut planner = NotificationPlanner::new(inbox.clone(), LeadTimes::default());

    planner.replan(epoch("A", true), &division_a(), &bounds(), at(10, 5)).await;
    let summary = planner.replan(epoch("A", false), &division_a(), &bounds(), at(10, 5)).await;
    assert_eq!(summary.cancelled, 4);
    assert_eq!(summary.scheduled, 0);

    advance(180).await;
    assert!(inbox.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_and_drop_stop_timers() {
    let inbox = Arc::new(Inbox::default());

    let mut planner = NotificationPlanner::new(inbox.clone(), LeadTimes::default());
    planner.replan(epoch("A", true), &division_a(), &bounds(), at(10, 5)).await;
    planner.teardown();
    assert!(planner.pending().is_empty());

    let mut dropped = NotificationPlanner::new(inbox.clone(), LeadTimes::default());
    dropped.replan(epoch("B", true), &division_b(), &bounds(), at(10, 5)).await;
    drop(dropped);

    advance(180).await;
    assert!(inbox.messages().is_empty());
}
