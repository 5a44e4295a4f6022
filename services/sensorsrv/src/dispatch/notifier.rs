//! Notification delivery

use crate::models::AlertEvent;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use errors::{CityError, CityResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Body posted to the notification endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    pub data: AlertEvent,
}

impl NotificationPayload {
    pub fn from_alert(alert: &AlertEvent) -> Self {
        let when = Utc
            .timestamp_millis_opt(alert.timestamp)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| alert.timestamp.to_string());

        Self {
            title: format!("Smart City Alert: {}", alert.level.as_str().to_uppercase()),
            message: format!(
                "Sensor {} ({}) reported a {} reading of {} at {}",
                alert.sensor, alert.sensor_type, alert.level, alert.value, when
            ),
            data: alert.clone(),
        }
    }
}

/// Outbound notification sink
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn notify(&self, payload: &NotificationPayload) -> CityResult<()>;
}

/// POSTs payloads as JSON; any non-2xx status is a failure
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> CityResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CityError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, payload: &NotificationPayload) -> CityResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| CityError::Notification {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CityError::Notification {
                endpoint: self.endpoint.clone(),
                reason: format!("HTTP {}", status),
            });
        }
        Ok(())
    }
}

/// Writes payloads to the log; used when no endpoint is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, payload: &NotificationPayload) -> CityResult<()> {
        info!(sensor_id = %payload.data.sensor, "{}: {}", payload.title, payload.message);
        Ok(())
    }
}
