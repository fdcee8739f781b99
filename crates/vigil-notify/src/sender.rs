use async_trait::async_trait;

use crate::{error::NotifyError, types::Notification};

/// Common interface implemented by every delivery adapter.
///
/// Implementations must be `Send + Sync` so one adapter instance can be
/// shared across the monitor's concurrent dispatch tasks. `send` takes
/// `&self` for the same reason — a connected adapter delivers concurrently
/// without a mutable borrow.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Stable lowercase identifier for this adapter (e.g. `"webhook"`).
    fn name(&self) -> &str;

    /// Deliver a single notification.
    ///
    /// Must return only after the endpoint has confirmed (or refused)
    /// delivery — the monitor records a dispatch as done solely on `Ok`.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}
