//! Access-log line classifier
//!
//! Turns one raw line into a [`LogOutcome`] or rejects it. Two shapes are
//! accepted and detected per line:
//! - one JSON object per line with `status` and optional `x_app_pool`
//! - a combined-format text line, where the status is the three-digit token
//!   after the request's closing quote and the pool comes from an optional
//!   `x_app_pool=<id>` / `pool=<id>` token

use crate::utils::Clock;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Upper bound of the error band; the lower bound is configurable
const MAX_ERROR_STATUS: u16 = 599;

/// One classified request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOutcome {
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
    pub pool_id: Option<String>,
}

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("empty line")]
    Empty,
    #[error("invalid JSON record: {0}")]
    InvalidJson(String),
    #[error("missing status field")]
    MissingStatus,
    #[error("status is not a valid HTTP code: {0}")]
    InvalidStatus(String),
    #[error("no status token after request")]
    NoStatusToken,
}

/// Range of status codes counted as errors: `[min, 599]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorBand {
    min: u16,
}

impl ErrorBand {
    /// 4xx and 5xx
    pub const CLIENT_AND_SERVER: ErrorBand = ErrorBand { min: 400 };
    /// 5xx only
    pub const SERVER_ONLY: ErrorBand = ErrorBand { min: 500 };

    /// Band starting at `min`, which must be a valid status code
    pub fn from_min(min: u16) -> Option<Self> {
        (100..=MAX_ERROR_STATUS)
            .contains(&min)
            .then_some(Self { min })
    }

    pub fn min_status(&self) -> u16 {
        self.min
    }

    pub fn is_error(&self, status: u16) -> bool {
        (self.min..=MAX_ERROR_STATUS).contains(&status)
    }
}

impl Default for ErrorBand {
    fn default() -> Self {
        Self::CLIENT_AND_SERVER
    }
}

/// Fields read from a structured record
#[derive(Debug, Deserialize)]
struct RawJsonRecord {
    status: Option<Value>,
    x_app_pool: Option<Value>,
}

/// Classifies raw lines, stamping each outcome with the injected clock
pub struct LineClassifier {
    clock: Arc<dyn Clock>,
}

impl LineClassifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Classify one raw line
    pub fn classify(&self, raw_line: &str) -> Result<LogOutcome, ParseFailure> {
        let (status_code, pool_id) = parse_line(raw_line)?;
        Ok(LogOutcome {
            timestamp: self.clock.now(),
            status_code,
            pool_id,
        })
    }
}

/// Extract `(status, pool)` from a line without stamping it
pub fn parse_line(raw_line: &str) -> Result<(u16, Option<String>), ParseFailure> {
    let line = raw_line.trim();
    if line.is_empty() {
        return Err(ParseFailure::Empty);
    }

    if line.starts_with('{') {
        parse_json_line(line)
    } else {
        parse_text_line(line)
    }
}

/// Integral JSON number as a status code; `200.0` counts, `200.5` does not
fn number_status(n: &serde_json::Number) -> Option<u16> {
    if let Some(n) = n.as_u64() {
        return u16::try_from(n).ok();
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&f)).then_some(f as u16)
}

fn parse_json_line(line: &str) -> Result<(u16, Option<String>), ParseFailure> {
    let record: RawJsonRecord =
        serde_json::from_str(line).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;

    let status = match record.status {
        None | Some(Value::Null) => return Err(ParseFailure::MissingStatus),
        Some(Value::Number(n)) => number_status(&n)
            .ok_or_else(|| ParseFailure::InvalidStatus(n.to_string()))?,
        Some(Value::String(s)) => parse_status(&s)?,
        Some(other) => return Err(ParseFailure::InvalidStatus(other.to_string())),
    };
    validate_status(status)?;

    let pool = match record.x_app_pool {
        Some(Value::String(s)) => normalize_pool(&s),
        _ => None,
    };

    Ok((status, pool))
}

fn parse_text_line(line: &str) -> Result<(u16, Option<String>), ParseFailure> {
    let captures = status_regex()
        .captures(line)
        .ok_or(ParseFailure::NoStatusToken)?;
    let status = parse_status(&captures[1])?;
    validate_status(status)?;

    let pool = pool_regex()
        .captures(line)
        .and_then(|c| c.get(2))
        .and_then(|m| normalize_pool(m.as_str()));

    Ok((status, pool))
}

fn parse_status(raw: &str) -> Result<u16, ParseFailure> {
    raw.trim()
        .parse()
        .map_err(|_| ParseFailure::InvalidStatus(raw.to_string()))
}

fn validate_status(status: u16) -> Result<(), ParseFailure> {
    if (100..=MAX_ERROR_STATUS).contains(&status) {
        Ok(())
    } else {
        Err(ParseFailure::InvalidStatus(status.to_string()))
    }
}

/// Empty and `-` (nginx's "no value") mean no pool
fn normalize_pool(raw: &str) -> Option<String> {
    let pool = raw.trim();
    if pool.is_empty() || pool == "-" {
        None
    } else {
        Some(pool.to_string())
    }
}

/// First quoted field is the request; the status follows its closing quote
fn status_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^[^"]*"[^"]*"\s+(\d{3})(?:\s|$)"#).expect("status regex is valid")
    })
}

fn pool_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|\s)(?:x_app_pool|pool)=("?)([^\s"]*)"#).expect("pool regex is valid")
    })
}
