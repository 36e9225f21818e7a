use anyhow::{Context, Result};
use serde::Deserialize;
use std::future::Future;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::redact;

/// Pushover API endpoints
const PUSHOVER_MESSAGES_URL: &str = "https://api.pushover.net/1/messages.json";
const PUSHOVER_VALIDATE_URL: &str = "https://api.pushover.net/1/users/validate.json";

/// Pushover limits (characters)
pub const MAX_TITLE_LENGTH: usize = 250;
pub const MAX_MESSAGE_LENGTH: usize = 1024;

/// Outcome of asking the user (or the service) to allow notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

impl Permission {
    pub fn is_granted(self) -> bool {
        self == Permission::Granted
    }
}

/// Delivery capability used by the planner.
///
/// Delivery is best-effort: an `Err` from `notify` is logged by the caller and
/// dropped, never retried.
pub trait Notifier: Send + Sync + 'static {
    fn is_permitted(&self) -> bool;

    fn request_permission(&self) -> impl Future<Output = Permission> + Send;

    fn notify(&self, title: &str, body: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Which delivery backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierChoice {
    Console,
    Pushover,
}

impl std::str::FromStr for NotifierChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "terminal" => Ok(NotifierChoice::Console),
            "pushover" => Ok(NotifierChoice::Pushover),
            other => anyhow::bail!("unknown notifier '{}' (expected console or pushover)", other),
        }
    }
}

/// Truncate text to `max` characters, ending with "..." when cut.
/// Prefers cutting at a word boundary.
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return ".".repeat(max);
    }

    // Byte offset of the (max - 3)th character
    let cut = text
        .char_indices()
        .nth(max - 3)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let truncated = &text[..cut];

    // Try to truncate at word boundary for cleaner output
    let truncated = truncated
        .rfind(' ')
        .filter(|&pos| pos > cut / 2)
        .map(|pos| &truncated[..pos])
        .unwrap_or(truncated);

    format!("{}...", truncated)
}

/// Prints notifications on the terminal, with a bell
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn is_permitted(&self) -> bool {
        true
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        info!("Notification: {} | {}", title, body);
        let mut out = std::io::stdout().lock();
        writeln!(out, "\x07\n🔔 {}\n   {}", title, body).context("Failed to write notification")?;
        out.flush().context("Failed to flush notification")?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct PushoverResponse {
    pub status: i32,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl PushoverResponse {
    pub fn is_success(&self) -> bool {
        self.status == 1
    }

    fn error_text(&self) -> String {
        if self.errors.is_empty() {
            "Unknown error".to_string()
        } else {
            self.errors.join("; ")
        }
    }
}

/// Build the message API form (credentials not exposed in URL)
pub fn build_message_params(
    api_token: &str,
    user_key: &str,
    title: &str,
    body: &str,
) -> [(&'static str, String); 4] {
    [
        ("token", api_token.to_string()),
        ("user", user_key.to_string()),
        ("title", truncate_text(title, MAX_TITLE_LENGTH)),
        ("message", truncate_text(body, MAX_MESSAGE_LENGTH)),
    ]
}

/// Push notifications through Pushover
pub struct PushoverNotifier {
    client: reqwest::Client,
    user_key: String,
    api_token: String,
    permitted: AtomicBool,
}

impl PushoverNotifier {
    pub fn new(user_key: String, api_token: String) -> Self {
        let permitted = !user_key.trim().is_empty() && !api_token.trim().is_empty();
        Self {
            client: reqwest::Client::new(),
            user_key,
            api_token,
            permitted: AtomicBool::new(permitted),
        }
    }

    async fn post(&self, url: &str, params: &[(&'static str, String)]) -> Result<PushoverResponse> {
        let response = self
            .client
            .post(url)
            .form(params)
            .send()
            .await
            .context("Failed to reach Pushover")?;

        response
            .json()
            .await
            .context("Failed to parse Pushover response")
    }
}

impl Notifier for PushoverNotifier {
    fn is_permitted(&self) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }

    async fn request_permission(&self) -> Permission {
        let params = [
            ("token", self.api_token.clone()),
            ("user", self.user_key.clone()),
        ];
        let granted = match self.post(PUSHOVER_VALIDATE_URL, &params).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                warn!(
                    "Pushover rejected user {}: {}",
                    redact::token(&self.user_key),
                    response.error_text()
                );
                false
            }
            Err(e) => {
                warn!("Pushover validation failed: {:#}", e);
                false
            }
        };
        self.permitted.store(granted, Ordering::SeqCst);
        if granted {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        if !self.is_permitted() {
            debug!("Pushover not permitted, dropping: {}", title);
            return Ok(());
        }

        let params = build_message_params(&self.api_token, &self.user_key, title, body);
        let response = self.post(PUSHOVER_MESSAGES_URL, &params).await?;
        if response.is_success() {
            debug!("Pushover accepted: {}", title);
            Ok(())
        } else {
            anyhow::bail!("Pushover API error: {}", response.error_text())
        }
    }
}

/// The notifier selected by configuration
pub enum AnyNotifier {
    Console(ConsoleNotifier),
    Pushover(PushoverNotifier),
}

impl AnyNotifier {
    pub fn from_config(config: &Config) -> Self {
        match config.notifier {
            NotifierChoice::Console => AnyNotifier::Console(ConsoleNotifier),
            NotifierChoice::Pushover => AnyNotifier::Pushover(PushoverNotifier::new(
                config.pushover_user_key.clone().unwrap_or_default(),
                config.pushover_api_token.clone().unwrap_or_default(),
            )),
        }
    }
}

impl Notifier for AnyNotifier {
    fn is_permitted(&self) -> bool {
        match self {
            AnyNotifier::Console(n) => n.is_permitted(),
            AnyNotifier::Pushover(n) => n.is_permitted(),
        }
    }

    async fn request_permission(&self) -> Permission {
        match self {
            AnyNotifier::Console(n) => n.request_permission().await,
            AnyNotifier::Pushover(n) => n.request_permission().await,
        }
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        match self {
            AnyNotifier::Console(n) => n.notify(title, body).await,
            AnyNotifier::Pushover(n) => n.notify(title, body).await,
        }
    }
}

/// In-memory notifier for unit tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String)>>,
        pub denied: AtomicBool,
        pub failing: AtomicBool,
    }

    impl RecordingNotifier {
        pub fn denied() -> Self {
            let n = Self::default();
            n.denied.store(true, Ordering::SeqCst);
            n
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }

        pub fn titles(&self) -> Vec<String> {
            self.sent().into_iter().map(|(t, _)| t).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn is_permitted(&self) -> bool {
            !self.denied.load(Ordering::SeqCst)
        }

        async fn request_permission(&self) -> Permission {
            if self.is_permitted() {
                Permission::Granted
            } else {
                Permission::Denied
            }
        }

        async fn notify(&self, title: &str, body: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("delivery failed");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message_params() {
        let params = build_message_params("tok", "usr", "Title", "Body");
        assert_eq!(params[0], ("token", "tok".to_string()));
        assert_eq!(params[1], ("user", "usr".to_string()));
        assert_eq!(params[2], ("title", "Title".to_string()));
        assert_eq!(params[3], ("message", "Body".to_string()));
    }

    #[test]
    fn test_build_message_params_truncates() {
        let long_title = "t".repeat(400);
        let params = build_message_params("tok", "usr", &long_title, "Body");
        assert_eq!(params[2].1.chars().count(), MAX_TITLE_LENGTH);
        assert!(params[2].1.ends_with("..."));
    }

    #[test]
    fn test_pushover_response_success() {
        let json = r#"{"status": 1, "request": "abc"}"#;
        let response: PushoverResponse = serde_json::from_str(json).unwrap();
        assert!(response.is_success());
        assert!(response.errors.is_empty());
    }

    #[test]
    fn test_pushover_response_error() {
        let json = r#"{"status": 0, "errors": ["user identifier is invalid"]}"#;
        let response: PushoverResponse = serde_json::from_str(json).unwrap();
        assert!(!response.is_success());
        assert_eq!(response.error_text(), "user identifier is invalid");
    }

    #[test]
    fn test_pushover_response_error_no_message() {
        let json = r#"{"status": 0}"#;
        let response: PushoverResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error_text(), "Unknown error");
    }

    #[test]
    fn test_notifier_choice_parse() {
        assert_eq!("console".parse::<NotifierChoice>().unwrap(), NotifierChoice::Console);
        assert_eq!(" Pushover ".parse::<NotifierChoice>().unwrap(), NotifierChoice::Pushover);
        assert!("sms".parse::<NotifierChoice>().is_err());
    }

    #[test]
    fn test_pushover_without_keys_is_not_permitted() {
        let notifier = PushoverNotifier::new(String::new(), "token".to_string());
        assert!(!notifier.is_permitted());
        let notifier = PushoverNotifier::new("user".to_string(), "token".to_string());
        assert!(notifier.is_permitted());
    }

    #[test]
    fn test_pushover_not_permitted_drops_silently() {
        let notifier = PushoverNotifier::new(String::new(), String::new());
        let result = tokio_test::block_on(notifier.notify("Title", "Body"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_console_always_permitted() {
        let notifier = ConsoleNotifier;
        assert!(notifier.is_permitted());
        assert_eq!(
            tokio_test::block_on(notifier.request_permission()),
            Permission::Granted
        );
    }

    // === truncation ===

    #[test]
    fn test_truncate_short_text() {
        assert_eq!(truncate_text("Hello world", 160), "Hello world");
    }

    #[test]
    fn test_truncate_exact_length() {
        let exact = "a".repeat(50);
        assert_eq!(truncate_text(&exact, 50), exact);
    }

    #[test]
    fn test_truncate_long_text() {
        let result = truncate_text(&"a".repeat(200), 50);
        assert_eq!(result.chars().count(), 50);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_truncate_word_boundary() {
        let text = "MATHS-102 starts in 10 minutes at 10:20 in room forty two";
        let result = truncate_text(text, 30);
        assert!(result.chars().count() <= 30);
        assert_eq!(result, "MATHS-102 starts in 10...");
    }

    #[test]
    fn test_truncate_multibyte() {
        let text = "📚".repeat(20);
        let result = truncate_text(&text, 10);
        assert_eq!(result.chars().count(), 10);
        assert!(result.starts_with("📚📚"));
    }

    #[test]
    fn test_truncate_tiny_limit() {
        assert_eq!(truncate_text("abcdef", 2), "..");
        assert_eq!(truncate_text("abcdef", 0), "");
    }
}
