//! lecturebell library - timetable viewer with lecture alerts
//!
//! This module exports internal components for integration testing.

pub mod cli;
pub mod config;
pub mod engine;
pub mod notify;
pub mod planner;
pub mod prefs;
pub mod redact;
pub mod resolver;
pub mod shell;
pub mod ticker;
pub mod timetable;
