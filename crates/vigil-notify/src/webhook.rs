//! Webhook delivery — JSON POST to a configured endpoint.
//!
//! Status mapping: 2xx is confirmed delivery, 4xx is a permanent
//! [`NotifyError::Rejected`], everything else (5xx, transport, timeout) is
//! transient and retried on a later scan.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::{error::NotifyError, sender::NotificationSender, types::Notification};

pub struct WebhookSender {
    url: String,
    token: Option<String>,
    timeout_ms: u64,
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(url: String, token: Option<String>, timeout_ms: u64) -> Self {
        Self {
            url,
            token,
            timeout_ms,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut req = self
            .client
            .post(&self.url)
            .json(notification)
            .timeout(Duration::from_millis(self.timeout_ms));
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout {
                    ms: self.timeout_ms,
                }
            } else {
                NotifyError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            debug!(
                appointment_id = %notification.appointment_id,
                kind = %notification.kind,
                "webhook accepted notification"
            );
            Ok(())
        } else if status.is_client_error() {
            Err(NotifyError::Rejected(format!(
                "endpoint returned {status}"
            )))
        } else {
            Err(NotifyError::Transport(format!(
                "endpoint returned {status}"
            )))
        }
    }
}
