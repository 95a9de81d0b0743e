use crate::monitoring::{CooldownScope, ErrorBand, WebhookFormat, WindowMode};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOG_PATH: &str = "/var/log/nginx/access.log";
pub const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 0.2;
pub const DEFAULT_WINDOW_SIZE: usize = 200;
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;
pub const DEFAULT_ALERT_COOLDOWN_SEC: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_ALERT_QUEUE_CAPACITY: usize = 64;

/// Watcher configuration, read from the environment
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub log_path: PathBuf,
    pub read_from_start: bool,
    pub poll_interval: Duration,

    /// Fraction in (0, 1]; the error-rate alert fires when the rate is strictly above it
    pub error_rate_threshold: f64,
    pub window_mode: WindowMode,
    pub min_samples: usize,
    pub error_band: ErrorBand,

    pub alert_cooldown: Duration,
    pub cooldown_scope: CooldownScope,

    pub webhook_url: Option<String>,
    pub webhook_format: WebhookFormat,
    pub webhook_timeout: Duration,
    pub alert_queue_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            read_from_start: false,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            error_rate_threshold: DEFAULT_ERROR_RATE_THRESHOLD,
            window_mode: WindowMode::Count {
                capacity: DEFAULT_WINDOW_SIZE,
            },
            min_samples: 1,
            error_band: ErrorBand::default(),
            alert_cooldown: Duration::from_secs(DEFAULT_ALERT_COOLDOWN_SEC),
            cooldown_scope: CooldownScope::default(),
            webhook_url: None,
            webhook_format: WebhookFormat::default(),
            webhook_timeout: Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS),
            alert_queue_capacity: DEFAULT_ALERT_QUEUE_CAPACITY,
        }
    }
}

impl WatcherConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value lookup
    ///
    /// Unset and blank values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let log_path = get("LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_path);

        let read_from_start = match get("LOG_READ_FROM_START") {
            Some(v) => parse_bool("LOG_READ_FROM_START", &v)?,
            None => false,
        };

        let poll_interval = Duration::from_millis(parse_number(
            "POLL_INTERVAL_MS",
            get("POLL_INTERVAL_MS"),
            DEFAULT_POLL_INTERVAL_MS,
        )?);

        let error_rate_threshold = match get("ERROR_RATE_THRESHOLD") {
            Some(raw) => parse_threshold(&raw)?,
            None => DEFAULT_ERROR_RATE_THRESHOLD,
        };

        let window_size = parse_number("WINDOW_SIZE", get("WINDOW_SIZE"), DEFAULT_WINDOW_SIZE)?;
        let window_seconds = parse_number(
            "WINDOW_SECONDS",
            get("WINDOW_SECONDS"),
            DEFAULT_WINDOW_SECONDS,
        )?;
        let window_mode = match get("WINDOW_MODE").as_deref().map(str::to_lowercase) {
            None => WindowMode::Count {
                capacity: window_size,
            },
            Some(mode) if mode == "count" => WindowMode::Count {
                capacity: window_size,
            },
            Some(mode) if mode == "time" => WindowMode::time_secs(window_seconds)
                .ok_or(ConfigError::WindowTooLong(window_seconds))?,
            Some(other) => return Err(ConfigError::InvalidWindowMode(other)),
        };
        if window_mode.is_degenerate() {
            return Err(ConfigError::EmptyWindow);
        }

        let min_samples = parse_number("MIN_SAMPLES", get("MIN_SAMPLES"), 1usize)?.max(1);

        let error_band = match get("ERROR_STATUS_MIN") {
            Some(raw) => {
                let min: u16 = raw.parse().map_err(|_| ConfigError::InvalidNumber {
                    key: "ERROR_STATUS_MIN",
                    value: raw.clone(),
                })?;
                ErrorBand::from_min(min).ok_or(ConfigError::InvalidStatusBand(min))?
            }
            None => ErrorBand::default(),
        };

        let alert_cooldown = Duration::from_secs(parse_number(
            "ALERT_COOLDOWN_SEC",
            get("ALERT_COOLDOWN_SEC"),
            DEFAULT_ALERT_COOLDOWN_SEC,
        )?);

        let cooldown_scope = match get("COOLDOWN_SCOPE") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidCooldownScope(raw))?,
            None => CooldownScope::default(),
        };

        let webhook_url = get("SLACK_WEBHOOK_URL").or_else(|| get("WEBHOOK_URL"));
        if webhook_url.is_none() {
            tracing::warn!("SLACK_WEBHOOK_URL not configured, alerts will only be logged");
        }

        let webhook_format = match get("WEBHOOK_FORMAT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidWebhookFormat(raw))?,
            None => WebhookFormat::default(),
        };

        let webhook_timeout = Duration::from_secs(parse_number(
            "WEBHOOK_TIMEOUT_SECS",
            get("WEBHOOK_TIMEOUT_SECS"),
            DEFAULT_WEBHOOK_TIMEOUT_SECS,
        )?);

        let alert_queue_capacity = parse_number(
            "ALERT_QUEUE_CAPACITY",
            get("ALERT_QUEUE_CAPACITY"),
            DEFAULT_ALERT_QUEUE_CAPACITY,
        )?
        .max(1);

        Ok(Self {
            log_path,
            read_from_start,
            poll_interval,
            error_rate_threshold,
            window_mode,
            min_samples,
            error_band,
            alert_cooldown,
            cooldown_scope,
            webhook_url,
            webhook_format,
            webhook_timeout,
            alert_queue_capacity,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}

/// Fractions are taken as-is; values in (1, 100] are read as percentages
fn parse_threshold(raw: &str) -> Result<f64, ConfigError> {
    let value: f64 = raw.parse().map_err(|_| ConfigError::InvalidNumber {
        key: "ERROR_RATE_THRESHOLD",
        value: raw.to_string(),
    })?;

    if !value.is_finite() || value <= 0.0 || value > 100.0 {
        return Err(ConfigError::InvalidThreshold(value));
    }

    Ok(if value > 1.0 { value / 100.0 } else { value })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be a boolean, got {value:?}")]
    InvalidBool { key: &'static str, value: String },
    #[error("ERROR_RATE_THRESHOLD must be in (0, 1] or a percentage in (1, 100], got {0}")]
    InvalidThreshold(f64),
    #[error("WINDOW_MODE must be 'count' or 'time', got {0:?}")]
    InvalidWindowMode(String),
    #[error("window size must be greater than zero")]
    EmptyWindow,
    #[error("WINDOW_SECONDS is too large, got {0}")]
    WindowTooLong(u64),
    #[error("ERROR_STATUS_MIN must be between 100 and 599, got {0}")]
    InvalidStatusBand(u16),
    #[error("COOLDOWN_SCOPE must be 'shared' or 'per_kind', got {0:?}")]
    InvalidCooldownScope(String),
    #[error("WEBHOOK_FORMAT must be 'slack' or 'discord', got {0:?}")]
    InvalidWebhookFormat(String),
}
