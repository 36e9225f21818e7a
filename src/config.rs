use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use crate::notify::NotifierChoice;

#[derive(Debug, Clone)]
pub struct Config {
    // Zone for every wall-clock read
    pub timezone: Tz,

    // Live ticker cadence
    pub tick_interval_secs: u64,

    // Alert lead times
    pub start_alert_minutes: i64,
    pub end_alert_minutes: i64,

    // Preference file (division, notifications flag)
    pub prefs_path: PathBuf,

    // Division used when no preference is stored
    pub default_division: Option<String>,

    // Notification delivery
    pub notifier: NotifierChoice,
    pub pushover_user_key: Option<String>,
    pub pushover_api_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            timezone: get("TIMEZONE")
                .unwrap_or_else(|| "Asia/Kolkata".to_string())
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .context("TIMEZONE must be an IANA zone name such as Asia/Kolkata")?,

            tick_interval_secs: get("TICK_INTERVAL_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(1),

            start_alert_minutes: get("START_ALERT_MINUTES")
                .unwrap_or_else(|| "10".to_string())
                .trim()
                .parse()
                .context("START_ALERT_MINUTES must be a whole number of minutes")?,
            end_alert_minutes: get("END_ALERT_MINUTES")
                .unwrap_or_else(|| "5".to_string())
                .trim()
                .parse()
                .context("END_ALERT_MINUTES must be a whole number of minutes")?,

            prefs_path: get("PREFS_PATH")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "./lecturebell-prefs.json".to_string())
                .into(),

            default_division: get("DEFAULT_DIVISION").filter(|s| !s.trim().is_empty()),

            notifier: get("NOTIFIER")
                .unwrap_or_else(|| "console".to_string())
                .parse()
                .context("NOTIFIER must be console or pushover")?,
            pushover_user_key: get("PUSHOVER_USER_KEY").filter(|s| !s.is_empty()),
            pushover_api_token: get("PUSHOVER_API_TOKEN").filter(|s| !s.is_empty()),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.tick_interval_secs == 0 {
            errors.push("TICK_INTERVAL_SECS must be greater than 0.".to_string());
        } else if self.tick_interval_secs > 60 {
            errors.push(format!(
                "TICK_INTERVAL_SECS={} is too coarse for a countdown (max: 60).",
                self.tick_interval_secs
            ));
        }

        for (key, minutes) in [
            ("START_ALERT_MINUTES", self.start_alert_minutes),
            ("END_ALERT_MINUTES", self.end_alert_minutes),
        ] {
            if !(1..=60).contains(&minutes) {
                errors.push(format!("{}={} must be between 1 and 60.", key, minutes));
            }
        }

        if self.notifier == NotifierChoice::Pushover {
            if self.pushover_user_key.is_none() {
                errors.push("PUSHOVER_USER_KEY is required when NOTIFIER=pushover.".to_string());
            }
            if self.pushover_api_token.is_none() {
                errors.push("PUSHOVER_API_TOKEN is required when NOTIFIER=pushover.".to_string());
            }
        }

        if let Some(parent) = self.prefs_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                errors.push(format!(
                    "PREFS_PATH directory '{}' does not exist.",
                    parent.display()
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }
}
