use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How notifications leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotifyMode {
    /// Deliver through the email HTTP API.
    Live,
    /// Log every message, deliver nothing.
    DryRun,
}

impl std::fmt::Display for NotifyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyMode::Live => write!(f, "live"),
            NotifyMode::DryRun => write!(f, "dry-run"),
        }
    }
}

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Price feed
    pub moralis_api_key: String,
    pub moralis_base_url: String,

    // Notifications
    pub notify_mode: NotifyMode,
    pub mail_api_url: String,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    /// Recipients of movement notifications.
    pub alert_recipients: Vec<String>,

    // HTTP API
    pub api_token: String,
    pub api_port: u16,

    // Database
    pub database_url: String,

    // Scheduling and deadlines
    pub tick_interval: Duration,
    pub feed_timeout: Duration,
    pub notify_timeout: Duration,
    pub store_timeout: Duration,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let notify_mode = match required_env("NOTIFY_MODE").to_lowercase().as_str() {
            "live" => NotifyMode::Live,
            "dry-run" | "dryrun" => NotifyMode::DryRun,
            other => panic!("ERROR: NOTIFY_MODE must be 'live' or 'dry-run', got: '{other}'"),
        };

        let mail_api_key = optional_env("MAIL_API_KEY");
        if notify_mode == NotifyMode::Live && mail_api_key.is_none() {
            panic!("MAIL_API_KEY must be set when NOTIFY_MODE=live");
        }

        let alert_recipients = parse_list(&required_env("ALERT_RECIPIENTS"));
        if alert_recipients.is_empty() {
            panic!("ALERT_RECIPIENTS must contain at least one address");
        }

        Config {
            moralis_api_key: required_env("MORALIS_API_KEY"),
            moralis_base_url: optional_env("MORALIS_BASE_URL")
                .unwrap_or_else(|| "https://deep-index.moralis.io/api/v2.2".to_string()),
            notify_mode,
            mail_api_url: optional_env("MAIL_API_URL")
                .unwrap_or_else(|| "https://api.resend.com/emails".to_string()),
            mail_api_key,
            mail_from: optional_env("MAIL_FROM")
                .unwrap_or_else(|| "alerts@pricewatch.local".to_string()),
            alert_recipients,
            api_token: required_env("API_TOKEN"),
            api_port: optional_env("API_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            database_url: required_env("DATABASE_URL"),
            tick_interval: secs_env("TICK_INTERVAL_SECS", 300),
            feed_timeout: secs_env("FEED_TIMEOUT_SECS", 10),
            notify_timeout: secs_env("NOTIFY_TIMEOUT_SECS", 10),
            store_timeout: secs_env("STORE_TIMEOUT_SECS", 5),
        }
    }
}

/// Split a comma-separated variable, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn secs_env(key: &str, default: u64) -> Duration {
    let secs = match optional_env(key) {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .unwrap_or_else(|| panic!("{key} must be a positive number of seconds, got: '{v}'")),
        None => default,
    };
    Duration::from_secs(secs)
}
