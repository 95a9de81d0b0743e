//! Webhook notifier
//!
//! Posts alerts to a single incoming-webhook URL. Slack takes a plain
//! `{"text": ...}` body; Discord gets an embed coloured by severity.

use crate::event::{Alert, Severity};
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Delivery channel for formatted alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert) -> AppResult<()>;
}

/// Body shape expected by the webhook endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WebhookFormat {
    #[default]
    Slack,
    Discord,
}

impl FromStr for WebhookFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slack" => Ok(WebhookFormat::Slack),
            "discord" => Ok(WebhookFormat::Discord),
            other => Err(format!("unknown webhook format: {other}")),
        }
    }
}

/// Slack incoming-webhook payload
#[derive(Debug, Serialize)]
pub struct SlackMessage {
    pub text: String,
}

/// Discord webhook payload
#[derive(Debug, Serialize)]
pub struct DiscordMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<DiscordEmbed>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    /// Colour as a decimal integer
    pub color: u32,
    /// ISO 8601
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Discord colour constants (decimal)
pub mod colors {
    pub const CRITICAL: u32 = 15158332; // #E74C3C
    pub const WARNING: u32 = 16776960; // #FFFF00
}

/// Notifier posting to one webhook URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    webhook_url: String,
    format: WebhookFormat,
    client: Client,
    enabled: bool,
}

impl WebhookNotifier {
    pub fn new(
        webhook_url: impl Into<String>,
        format: WebhookFormat,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal_error(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            format,
            client,
            enabled: true,
        })
    }

    /// Notifier used when no webhook is configured: alerts are only logged
    pub fn disabled() -> Self {
        Self {
            webhook_url: String::new(),
            format: WebhookFormat::default(),
            client: Client::new(),
            enabled: false,
        }
    }

    /// Build from an optional URL; `None` yields a disabled notifier
    pub fn from_config(
        webhook_url: Option<&str>,
        format: WebhookFormat,
        timeout: Duration,
    ) -> AppResult<Self> {
        match webhook_url {
            Some(url) => Self::new(url, format, timeout),
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.webhook_url.is_empty()
    }

    pub fn severity_to_color(severity: Severity) -> u32 {
        match severity {
            Severity::Critical => colors::CRITICAL,
            Severity::Warning => colors::WARNING,
        }
    }

    /// JSON body for `alert` in the configured format
    pub fn render_body(&self, alert: &Alert) -> serde_json::Value {
        let rendered = match self.format {
            WebhookFormat::Slack => serde_json::to_value(SlackMessage {
                text: alert.message.clone(),
            }),
            WebhookFormat::Discord => serde_json::to_value(DiscordMessage {
                content: None,
                embeds: Some(vec![DiscordEmbed {
                    title: alert.title.clone(),
                    description: alert.message.clone(),
                    color: Self::severity_to_color(alert.severity),
                    timestamp: Some(alert.timestamp.to_rfc3339()),
                }]),
            }),
        };
        rendered.unwrap_or_else(|_| serde_json::json!({ "text": alert.message }))
    }

    async fn post(&self, body: &serde_json::Value) -> AppResult<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {e}")
                } else {
                    e.to_string()
                };
                // A request that cannot be built fails the same way every time
                AppError::NotifyTransport {
                    retryable: !e.is_builder(),
                    reason,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NotifyStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, alert), fields(kind = %alert.kind))]
    async fn send(&self, alert: &Alert) -> AppResult<()> {
        if !self.is_enabled() {
            debug!("Webhook not configured, skipping delivery");
            return Ok(());
        }

        let body = self.render_body(alert);
        match self.post(&body).await {
            Ok(()) => {
                info!("Alert delivered to webhook");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Webhook delivery failed");
                Err(e)
            }
        }
    }
}
