//! Log-only delivery — the fallback adapter when no webhook is configured.
//!
//! Every send "succeeds", so dispatch records are still written and the
//! exactly-once accounting behaves identically to a real transport. Useful
//! for local runs and as the default in tests.

use async_trait::async_trait;
use tracing::info;

use crate::{error::NotifyError, sender::NotificationSender, types::Notification};

#[derive(Default)]
pub struct LogSender;

impl LogSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSender for LogSender {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            appointment_id = %notification.appointment_id,
            recipient = %notification.recipient,
            kind = %notification.kind,
            subject = %notification.subject,
            "notification (log sender)"
        );
        Ok(())
    }
}
